use super::ChatState;
use crate::config::{
    MAX_MAX_TOKENS, MAX_TEMPERATURE, MIN_MAX_TOKENS, MIN_TEMPERATURE, SUPPORTED_MODELS,
    is_supported_model,
};
use crate::core::error::NoteaiError;
use crate::providers::Role;
use crate::session::{CopyOutcome, InsertOutcome};

use console::style;

pub trait CommandHandler {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError>;
    fn help(&self) -> &'static str;
}

pub struct QuitCommand;
pub struct HelpCommand;
pub struct AddCommand;
pub struct RemoveCommand;
pub struct ClearCommand;
pub struct ContextCommand;
pub struct NotesCommand;
pub struct CopyCommand;
pub struct InsertCommand;
pub struct ModelCommand;
pub struct TokensCommand;
pub struct TemperatureCommand;
pub struct KeyCommand;
pub struct TranscriptCommand;

impl CommandHandler for QuitCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, NoteaiError> {
        state.should_continue = false;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/quit - Close the assistant"
    }
}

impl CommandHandler for HelpCommand {
    fn execute(
        &self,
        _state: &mut ChatState,
        _args: &[&str],
    ) -> Result<Option<String>, NoteaiError> {
        let title = style("Available Commands").bold().underlined();
        let help_text = [
            title.to_string(),
            QuitCommand.help().to_string(),
            HelpCommand.help().to_string(),
            AddCommand.help().to_string(),
            RemoveCommand.help().to_string(),
            ClearCommand.help().to_string(),
            ContextCommand.help().to_string(),
            NotesCommand.help().to_string(),
            CopyCommand.help().to_string(),
            InsertCommand.help().to_string(),
            ModelCommand.help().to_string(),
            TokensCommand.help().to_string(),
            TemperatureCommand.help().to_string(),
            KeyCommand.help().to_string(),
            TranscriptCommand.help().to_string(),
            style("Anything else is sent as a question.").dim().to_string(),
        ]
        .join("\n");

        Ok(Some(help_text))
    }

    fn help(&self) -> &'static str {
        "/help - Show available commands"
    }
}

fn note_name(args: &[&str]) -> Result<String, NoteaiError> {
    let name = args.join(" ");
    if name.trim().is_empty() {
        return Err(NoteaiError::Input("Please name a note".to_string()));
    }
    Ok(name)
}

impl CommandHandler for AddCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let name = note_name(args)?;
        let doc = state.vault()?.resolve(&name)?;
        let title = doc.title.clone();
        if state.session.add_context(doc) {
            Ok(Some(format!("Added '{}' to context", title)))
        } else {
            Ok(Some(format!("'{}' is already in context", title)))
        }
    }

    fn help(&self) -> &'static str {
        "/add <note> - Use a note as context"
    }
}

impl CommandHandler for RemoveCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let name = note_name(args)?;
        let selected = state.session.context();

        // A position from /context, an id, or a title
        let found = match name.parse::<usize>() {
            Ok(n) if n >= 1 => selected.get(n - 1).cloned(),
            _ => {
                let lowered = name.to_lowercase();
                selected
                    .iter()
                    .find(|d| {
                        d.id == name
                            || d.id == format!("{}.md", name)
                            || d.title.to_lowercase() == lowered
                    })
                    .cloned()
            }
        };

        match found {
            Some(doc) if state.session.remove_context(&doc) => {
                Ok(Some(format!("Removed '{}' from context", doc.title)))
            }
            _ => Err(NoteaiError::Input(format!("'{}' is not in context", name))),
        }
    }

    fn help(&self) -> &'static str {
        "/remove <note|n> - Stop using a note as context"
    }
}

impl CommandHandler for ClearCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, NoteaiError> {
        state.session.clear_context();
        Ok(Some("Context cleared.".to_string()))
    }

    fn help(&self) -> &'static str {
        "/clear - Remove all notes from context"
    }
}

impl CommandHandler for ContextCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let selected = state.session.context();
        if selected.is_empty() {
            return Ok(Some("No notes selected".to_string()));
        }

        let mut lines = vec![style("Selected notes").bold().underlined().to_string()];
        for (i, doc) in selected.iter().enumerate() {
            lines.push(format!(
                "{:>3}. {} {}",
                i + 1,
                doc.title,
                style(format!("({})", doc.id)).dim()
            ));
        }
        Ok(Some(lines.join("\n")))
    }

    fn help(&self) -> &'static str {
        "/context - List notes used as context"
    }
}

impl CommandHandler for NotesCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let query = args.join(" ");
        let notes = state.vault()?.search(&query)?;
        if notes.is_empty() {
            return Ok(Some("No notes found.".to_string()));
        }

        let selected = state.session.context();
        let lines: Vec<String> = notes
            .iter()
            .map(|doc| {
                let marker = if selected.contains(doc) { "*" } else { " " };
                format!("{} {} {}", marker, doc.title, style(format!("({})", doc.id)).dim())
            })
            .collect();
        Ok(Some(lines.join("\n")))
    }

    fn help(&self) -> &'static str {
        "/notes [query] - Search notes in the vault"
    }
}

impl CommandHandler for CopyCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let exchange = state.exchange_arg(args)?;
        match state
            .session
            .copy_result(&exchange.answer, state.clipboard.as_mut())
        {
            CopyOutcome::Copied => Ok(Some("Response copied to clipboard".to_string())),
            CopyOutcome::Failed(reason) => Err(NoteaiError::Clipboard(format!(
                "Failed to copy response: {}",
                reason
            ))),
        }
    }

    fn help(&self) -> &'static str {
        "/copy [n] - Copy the latest (or n-th) response"
    }
}

impl CommandHandler for InsertCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let exchange = state.exchange_arg(args)?;
        match state.session.insert_result(&exchange.answer, None) {
            InsertOutcome::Inserted { at } => Ok(Some(format!(
                "Response inserted into note at line {}",
                at.line + 1
            ))),
            InsertOutcome::NoDestination => {
                Ok(Some("No active editor to insert content into".to_string()))
            }
            InsertOutcome::Failed(reason) => Err(NoteaiError::Document(format!(
                "Response inserted but the note could not be saved: {}",
                reason
            ))),
        }
    }

    fn help(&self) -> &'static str {
        "/insert [n] - Insert the latest (or n-th) response into the note"
    }
}

impl CommandHandler for ModelCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let current = state.settings.snapshot().model;
        let Some(model) = args.first() else {
            let mut lines = vec![format!("Current model: {}", style(&current).cyan())];
            for (id, label) in SUPPORTED_MODELS {
                let marker = if *id == current { "*" } else { " " };
                lines.push(format!("{} {} {}", marker, id, style(format!("({})", label)).dim()));
            }
            return Ok(Some(lines.join("\n")));
        };

        if !is_supported_model(model) {
            let known: Vec<&str> = SUPPORTED_MODELS.iter().map(|(id, _)| *id).collect();
            return Err(NoteaiError::Input(format!(
                "Unknown model '{}'. Choose one of: {}",
                model,
                known.join(", ")
            )));
        }
        state.update_settings(|s| s.model = model.to_string())?;
        Ok(Some(format!("Switched to model: {}", model)))
    }

    fn help(&self) -> &'static str {
        "/model [name] - Show or switch the model"
    }
}

impl CommandHandler for TokensCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let Some(raw) = args.first() else {
            return Ok(Some(format!(
                "Max tokens: {}",
                state.settings.snapshot().max_tokens
            )));
        };
        let requested: u32 = raw
            .parse()
            .map_err(|_| NoteaiError::Input(format!("Not a token count: {}", raw)))?;
        let updated =
            state.update_settings(|s| s.max_tokens = requested.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS))?;
        Ok(Some(format!("Max tokens set to {}", updated.max_tokens)))
    }

    fn help(&self) -> &'static str {
        "/tokens [n] - Show or set the response length limit (256-4096)"
    }
}

impl CommandHandler for TemperatureCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let Some(raw) = args.first() else {
            return Ok(Some(format!(
                "Temperature: {}",
                state.settings.snapshot().temperature
            )));
        };
        let requested: f32 = raw
            .parse()
            .ok()
            .filter(|t: &f32| t.is_finite())
            .ok_or_else(|| NoteaiError::Input(format!("Not a temperature: {}", raw)))?;
        let updated = state
            .update_settings(|s| s.temperature = requested.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE))?;
        Ok(Some(format!("Temperature set to {}", updated.temperature)))
    }

    fn help(&self) -> &'static str {
        "/temperature [t] - Show or set sampling temperature (0-2)"
    }
}

impl CommandHandler for KeyCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let Some(key) = args.first() else {
            let status = match state.settings.snapshot().credential() {
                Some(_) => "API key is set",
                None => "API key is not set",
            };
            return Ok(Some(status.to_string()));
        };
        let key = key.to_string();
        state.update_settings(|s| s.api_key = Some(key))?;
        Ok(Some("API key updated".to_string()))
    }

    fn help(&self) -> &'static str {
        "/key [value] - Show whether an API key is set, or set it"
    }
}

impl CommandHandler for TranscriptCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, NoteaiError> {
        let transcript = state.session.transcript();
        if transcript.is_empty() {
            return Ok(Some("Nothing asked yet.".to_string()));
        }

        let lines: Vec<String> = transcript
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => style(m.role.as_str()).green().bold(),
                    Role::Assistant => style(m.role.as_str()).cyan().bold(),
                    Role::System => style(m.role.as_str()).dim(),
                };
                format!("{}: {}", role, m.content)
            })
            .collect();
        Ok(Some(lines.join("\n\n")))
    }

    fn help(&self) -> &'static str {
        "/transcript - Show this session's questions and answers"
    }
}
