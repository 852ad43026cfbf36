//! Crate-wide error type
//!
//! Library code returns structured `thiserror` enums; the CLI layer wraps
//! them with `anyhow` context.

use thiserror::Error;

use crate::providers::ProviderError;
use crate::session::PersistenceError;

#[derive(Error, Debug)]
pub enum DiasError {
    /// History file could not be read, parsed or written
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The completion request failed; the log is unaffected
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The reply channel closed before an answer arrived
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// A one-shot request was made while another reply is outstanding
    #[error("still waiting for the previous reply")]
    Busy,
}

impl DiasError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// A hint to show the user next to the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            DiasError::Provider(e) if e.is_auth_error() => Some(
                "Check your API key (OPENAI_API_KEY, OPENROUTER_API_KEY or the config file)."
                    .to_string(),
            ),
            DiasError::Provider(ProviderError::Config { .. }) | DiasError::Config { .. } => Some(
                "No usable provider configured. Set OPENAI_API_KEY or OPENROUTER_API_KEY."
                    .to_string(),
            ),
            DiasError::Provider(e) if e.is_retryable() => {
                Some("The provider is unreachable or busy. Try again shortly.".to_string())
            }
            DiasError::Provider(_) => {
                Some("Your message was kept in the history. Try sending again.".to_string())
            }
            DiasError::Persistence(e) if e.is_corrupt() => Some(
                "The history file is damaged. It was set aside with a .corrupted suffix.".to_string(),
            ),
            DiasError::Persistence(_) => Some(
                "Check that the history path is writable, or pass --history.".to_string(),
            ),
            DiasError::InvalidInput { .. } => Some("Type /help for commands.".to_string()),
            DiasError::Busy => Some("Wait for the reply, then send again.".to_string()),
            DiasError::Channel { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DiasError>;
