//! Ways a completion request can fail
//!
//! None of these end the chat session. `is_retryable` only tells the HTTP
//! client whether sending the same request again is worth it.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("could not reach the provider: {message}")]
    Network { message: String },

    #[error("no reply within {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("the provider rejected the credentials: {message}")]
    Auth { message: String },

    /// `retry_after` comes from the `Retry-After` header, in seconds
    #[error("rate limited by the provider")]
    RateLimited { retry_after: Option<u64> },

    #[error("the provider answered with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The provider answered, but not with a usable reply
    #[error("unusable reply from the provider: {message}")]
    Reply { message: String },

    /// The task running the request stopped before it produced a result
    #[error("completion request aborted: {message}")]
    Aborted { message: String },

    #[error("provider misconfigured: {message}")]
    Config { message: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network { .. }
            | ProviderError::Timeout { .. }
            | ProviderError::RateLimited { .. } => true,
            ProviderError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, ProviderError::Auth { .. })
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn reply(message: impl Into<String>) -> Self {
        Self::Reply {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
