pub mod dispatcher;
pub mod handler;
pub mod registry;

use crate::clipboard::Clipboard;
use crate::config::{Settings, SharedSettings};
use crate::core::error::NoteaiError;
use crate::document::Vault;
use crate::session::{AssistantSession, Exchange};
use std::path::PathBuf;
use std::sync::Arc;

pub use dispatcher::create_command_registry;

pub struct ChatState {
    pub session: Arc<AssistantSession>,
    pub vault: Option<Vault>,
    pub settings: SharedSettings,
    pub clipboard: Box<dyn Clipboard>,
    /// Where settings edits are saved; `None` keeps them in memory only.
    pub config_path: Option<PathBuf>,
    pub should_continue: bool,
}

impl ChatState {
    pub fn new(
        session: Arc<AssistantSession>,
        vault: Option<Vault>,
        settings: SharedSettings,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Self {
            session,
            vault,
            settings,
            clipboard,
            config_path: None,
            should_continue: true,
        }
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn vault(&self) -> Result<&Vault, NoteaiError> {
        self.vault.as_ref().ok_or_else(|| {
            NoteaiError::Config("No vault configured. Pass --vault or set `vault` in the config.".to_string())
        })
    }

    /// Applies a settings change and persists it when a config path is set.
    pub fn update_settings(&self, change: impl FnOnce(&mut Settings)) -> Result<Settings, NoteaiError> {
        let updated = self.settings.update(change);
        if let Some(path) = &self.config_path {
            updated.save_to(path)?;
        }
        Ok(updated)
    }

    /// Parses an optional 1-based exchange index argument.
    pub fn exchange_arg(&self, args: &[&str]) -> Result<Exchange, NoteaiError> {
        let index = match args.first() {
            None => None,
            Some(raw) => Some(
                raw.parse::<usize>()
                    .map_err(|_| NoteaiError::Input(format!("Not a response number: {}", raw)))?,
            ),
        };
        self.session
            .exchange(index)
            .ok_or_else(|| NoteaiError::Input("No response to use yet".to_string()))
    }
}
