use crate::commands::dispatcher::CommandDispatcher;
use crate::config::Settings;
use crate::core::error::NoteaiError;

use console::style;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, EditMode, Editor, Helper};
use std::borrow::Cow;
use tracing::debug;

/// Commands whose argument is a note name.
const NOTE_COMMANDS: &[&str] = &["add", "remove"];

/// Commands whose arguments are secrets and must not reach the history file.
const SECRET_COMMANDS: &[&str] = &["key"];

/// Whether `line` belongs in the input history.
fn should_remember(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match line.strip_prefix('/').and_then(|rest| rest.split_once(char::is_whitespace)) {
        Some((command, args)) => !(SECRET_COMMANDS.contains(&command) && !args.trim().is_empty()),
        None => true,
    }
}

/// Completes `/command` names, and note titles after `/add` and `/remove`.
pub struct ChatCompleter {
    command_registry: CommandDispatcher,
    note_titles: Vec<String>,
}

impl ChatCompleter {
    pub fn new(command_registry: CommandDispatcher, note_titles: Vec<String>) -> Self {
        Self {
            command_registry,
            note_titles,
        }
    }

    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let Some(rest) = line[..pos].strip_prefix('/') else {
            return (pos, Vec::new());
        };

        match rest.split_once(' ') {
            None => {
                let matches = self
                    .command_registry
                    .get_command_names()
                    .into_iter()
                    .filter(|cmd| cmd.starts_with(rest))
                    .map(|cmd| Pair {
                        display: cmd.to_string(),
                        replacement: cmd.to_string(),
                    })
                    .collect();
                (1, matches)
            }
            Some((command, partial)) if NOTE_COMMANDS.contains(&command) => {
                let lowered = partial.to_lowercase();
                let matches = self
                    .note_titles
                    .iter()
                    .filter(|title| title.to_lowercase().starts_with(&lowered))
                    .map(|title| Pair {
                        display: title.clone(),
                        replacement: title.clone(),
                    })
                    .collect();
                (command.len() + 2, matches)
            }
            Some(_) => (pos, Vec::new()),
        }
    }
}

impl Completer for ChatCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

/// Helper struct that combines the rustyline components
pub struct ChatHelper {
    completer: ChatCompleter,
    hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(command_registry: CommandDispatcher, note_titles: Vec<String>) -> Self {
        Self {
            completer: ChatCompleter::new(command_registry, note_titles),
            hinter: HistoryHinter {},
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(style(hint).dim().to_string())
    }
}

impl Validator for ChatHelper {}

/// Creates a configured rustyline editor
pub fn create_editor(
    command_registry: CommandDispatcher,
    note_titles: Vec<String>,
) -> Result<Editor<ChatHelper, FileHistory>, NoteaiError> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut editor = Editor::with_config(config)
        .map_err(|e| NoteaiError::Input(format!("Failed to create line editor: {}", e)))?;
    editor.set_helper(Some(ChatHelper::new(command_registry, note_titles)));

    let history_path = Settings::history_path();
    if editor.load_history(&history_path).is_err() {
        debug!(path = %history_path.display(), "No input history loaded");
    }

    Ok(editor)
}

/// Reads a line of input. `None` means the user asked to leave.
pub fn read_input(
    editor: &mut Editor<ChatHelper, FileHistory>,
    prompt: &str,
) -> Result<Option<String>, NoteaiError> {
    let prompt = if cfg!(windows) && std::env::var("PSModulePath").is_ok() {
        format!("{}> ", prompt)
    } else {
        format!("{}{} ", style(prompt).dim(), style(">").bold().cyan())
    };
    match editor.readline(&prompt) {
        Ok(line) => {
            if should_remember(&line) {
                editor.add_history_entry(&line).map_err(|e| {
                    NoteaiError::Input(format!("Failed to add history entry: {}", e))
                })?;
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Saves the editor history
pub fn save_history(editor: &mut Editor<ChatHelper, FileHistory>) -> Result<(), NoteaiError> {
    let history_path = Settings::history_path();

    if let Some(parent) = history_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NoteaiError::Input(format!("Failed to create history directory: {}", e))
            })?;
        }
    }

    editor
        .save_history(&history_path)
        .map_err(|e| NoteaiError::Input(format!("Failed to save history: {}", e)))
}
