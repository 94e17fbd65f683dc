use std::io;
use thiserror::Error;

/// Unified error type for noteai
#[derive(Error, Debug)]
pub enum NoteaiError {
    /// Completion API errors, including malformed responses
    #[error("API error: {0}")]
    Api(String),

    /// No API key configured; raised before any request is made
    #[error(
        "OpenAI API key is not set. Configure it with /key or the OPENAI_API_KEY environment variable."
    )]
    MissingCredential,

    /// A question that settled into the failed state. The session stores
    /// the already formatted cause (API, credential or note read error), so
    /// it is shown as is rather than prefixed again like `Api`.
    #[error("{0}")]
    Request(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// Note lookup and read errors
    #[error("Document error: {0}")]
    Document(String),

    /// Clipboard access errors
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// File watching errors
    #[error("Watch error: {0}")]
    Watch(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for NoteaiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NoteaiError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            NoteaiError::Network(format!("Connection failed: {}", err))
        } else if err.is_status() {
            NoteaiError::Api(format!("API returned error status: {}", err))
        } else {
            NoteaiError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for NoteaiError {
    fn from(err: serde_json::Error) -> Self {
        NoteaiError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for NoteaiError {
    fn from(err: serde_yml::Error) -> Self {
        NoteaiError::Serialization(format!("YAML error: {}", err))
    }
}

impl From<notify::Error> for NoteaiError {
    fn from(err: notify::Error) -> Self {
        NoteaiError::Watch(err.to_string())
    }
}

impl From<arboard::Error> for NoteaiError {
    fn from(err: arboard::Error) -> Self {
        NoteaiError::Clipboard(err.to_string())
    }
}

impl From<rustyline::error::ReadlineError> for NoteaiError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        NoteaiError::Input(format!("Input error: {}", err))
    }
}
