use super::{
    ChatState,
    handler::{
        AddCommand, ClearCommand, ContextCommand, CopyCommand, HelpCommand, InsertCommand,
        KeyCommand, ModelCommand, NotesCommand, QuitCommand, RemoveCommand, TemperatureCommand,
        TokensCommand, TranscriptCommand,
    },
    registry::CommandRegistry,
};
use crate::core::error::NoteaiError;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn execute(
        &self,
        command: &str,
        args: &[&str],
        state: &mut ChatState,
    ) -> Result<Option<String>, NoteaiError> {
        self.registry.execute(command, args, state)
    }

    /// Splits a `/command arg...` line and runs it. Returns `None` for non-command input.
    pub fn dispatch_line(
        &self,
        line: &str,
        state: &mut ChatState,
    ) -> Option<Result<Option<String>, NoteaiError>> {
        let rest = line.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let command = parts.next()?;
        let args: Vec<&str> = parts.collect();
        Some(self.execute(command, &args, state))
    }

    pub fn get_command_names(&self) -> Vec<String> {
        self.registry.get_command_names()
    }
}

pub fn create_command_registry() -> CommandDispatcher {
    let mut registry = CommandRegistry::new();

    registry.register("quit", QuitCommand);
    registry.register("help", HelpCommand);
    registry.register("add", AddCommand);
    registry.register("remove", RemoveCommand);
    registry.register("clear", ClearCommand);
    registry.register("context", ContextCommand);
    registry.register("notes", NotesCommand);
    registry.register("copy", CopyCommand);
    registry.register("insert", InsertCommand);
    registry.register("model", ModelCommand);
    registry.register("tokens", TokensCommand);
    registry.register("temperature", TemperatureCommand);
    registry.register("key", KeyCommand);
    registry.register("transcript", TranscriptCommand);

    CommandDispatcher::new(Arc::new(registry))
}
