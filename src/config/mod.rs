use crate::core::error::NoteaiError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant for note-taking. Provide clear, concise answers.";

/// Models offered for selection, with display labels.
pub const SUPPORTED_MODELS: &[(&str, &str)] = &[
    ("gpt-4o-mini", "GPT-4o Mini"),
    ("gpt-4o", "GPT-4o"),
    ("gpt-4", "GPT-4"),
    ("gpt-4o-turbo", "GPT-4o Turbo"),
    ("gpt-3.5-turbo", "GPT-3.5 Turbo"),
];

pub const MIN_MAX_TOKENS: u32 = 256;
pub const MAX_MAX_TOKENS: u32 = 4096;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.iter().any(|(id, _)| *id == model)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<PathBuf>,
    /// Key taken from `OPENAI_API_KEY`. Used when `api_key` is unset and
    /// never written back to the config file.
    #[serde(skip)]
    pub env_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            vault: None,
            env_api_key: None,
        }
    }
}

impl Settings {
    fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".noteai")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn history_path() -> PathBuf {
        Self::config_dir().join("input_history.txt")
    }

    pub fn log_dir() -> PathBuf {
        Self::config_dir().join("logs")
    }

    pub fn load() -> Result<Settings, NoteaiError> {
        let settings = Self::load_from(&Self::config_path())?;
        Ok(settings.with_env_key(std::env::var(API_KEY_ENV).ok()))
    }

    /// Attaches a key from the environment as the fallback credential.
    pub fn with_env_key(mut self, key: Option<String>) -> Self {
        self.env_api_key = key.filter(|k| !k.trim().is_empty());
        if self.env_api_key.is_some() && self.stored_key().is_none() {
            debug!("Using API key from environment");
        }
        self
    }

    /// Reads settings from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Settings, NoteaiError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let settings = serde_yml::from_str::<Settings>(&contents)
                .map_err(|e| NoteaiError::Config(format!("Parse {}: {}", path.display(), e)))?;
            info!(path = %path.display(), model = %settings.model, "Config loaded");
            return Ok(settings.normalized());
        }

        let settings = Settings::default();
        if let Err(e) = settings.save_to(path) {
            warn!(path = %path.display(), error = %e, "Failed to write default config");
        }
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), NoteaiError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), NoteaiError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Clamps numeric bounds and replaces an unsupported model with the default.
    pub fn normalized(mut self) -> Self {
        if !is_supported_model(&self.model) {
            warn!(model = %self.model, "Unsupported model in config, using {}", DEFAULT_MODEL);
            self.model = default_model();
        }
        self.max_tokens = self.max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS);
        self.temperature = if self.temperature.is_nan() {
            default_temperature()
        } else {
            self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
        };
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn stored_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// The configured API key, else the one from the environment.
    pub fn credential(&self) -> Option<&str> {
        self.stored_key().or(self.env_api_key.as_deref())
    }
}

/// Settings shared between the front-end that edits them and the sessions
/// that read a fresh snapshot on every request.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Applies `change` and returns the updated settings.
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Settings {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut guard);
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.max_tokens, 1024);
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.base_url(), DEFAULT_BASE_URL);
        assert!(settings.credential().is_none());
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let settings: Settings = serde_yml::from_str("api_key: sk-test\ntemperature: 1.2\n").unwrap();
        assert_eq!(settings.credential(), Some("sk-test"));
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert!((settings.temperature - 1.2).abs() < f32::EPSILON);
    }

    #[test]
    fn normalized_clamps_bounds_and_model() {
        let settings = Settings {
            model: "gpt-9".to_string(),
            max_tokens: 100_000,
            temperature: -1.0,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.max_tokens, MAX_MAX_TOKENS);
        assert_eq!(settings.temperature, MIN_TEMPERATURE);

        let low = Settings {
            max_tokens: 1,
            temperature: 7.5,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(low.max_tokens, MIN_MAX_TOKENS);
        assert_eq!(low.temperature, MAX_TEMPERATURE);
    }

    #[test]
    fn blank_api_key_is_not_a_credential() {
        let settings = Settings {
            api_key: Some("   ".to_string()),
            ..Settings::default()
        };
        assert!(settings.credential().is_none());
    }

    #[test]
    fn env_key_is_a_fallback_and_never_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let settings = Settings::default().with_env_key(Some("sk-env".to_string()));
        assert_eq!(settings.credential(), Some("sk-env"));

        settings.save_to(&path).unwrap();
        let yaml = fs::read_to_string(&path).unwrap();
        assert!(!yaml.contains("sk-env"), "{yaml}");
        assert!(Settings::load_from(&path).unwrap().credential().is_none());

        let explicit = Settings {
            api_key: Some("sk-file".to_string()),
            ..settings
        };
        assert_eq!(explicit.credential(), Some("sk-file"));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let settings = Settings {
            api_key: Some("sk-saved".to_string()),
            model: "gpt-4o".to_string(),
            max_tokens: 2048,
            vault: Some(PathBuf::from("/notes")),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn invalid_yaml_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "max_tokens: [not, a, number]").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(NoteaiError::Config(_))
        ));
    }

    #[test]
    fn shared_settings_updates_are_visible_to_snapshots() {
        let shared = SharedSettings::new(Settings::default());
        let before = shared.snapshot();
        let after = shared.update(|s| s.model = "gpt-4".to_string());
        assert_eq!(before.model, DEFAULT_MODEL);
        assert_eq!(after.model, "gpt-4");
        assert_eq!(shared.snapshot().model, "gpt-4");
    }
}
