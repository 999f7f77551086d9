//! Error types for the Jarvis assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
///
/// Nothing in the voice loop is fatal: every variant is contained within the
/// cycle that produced it and surfaced to the dashboard as text.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing keys, invalid values)
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration reload failed; the previous snapshot stays in effect
    #[error("configuration reload failed: {0}")]
    ConfigReload(String),

    /// Audio hardware unavailable or failing; retried next cycle
    #[error("audio device error: {0}")]
    Device(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// AI backend error
    #[error("AI backend error: {0}")]
    Backend(String),

    /// A single integration failed while handling a command
    #[error("integration {id} failed: {message}")]
    Integration {
        /// Integration identifier
        id: String,
        /// Failure description
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build an integration error
    pub fn integration(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integration {
            id: id.into(),
            message: message.into(),
        }
    }
}
