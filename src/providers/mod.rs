//! Completion backends
//!
//! A provider receives the conversation so far and answers with the text of
//! the next assistant turn. It holds no state about the conversation; the
//! caller sends the whole log every time.

use serde::{Deserialize, Serialize};

use crate::session::Role;

pub mod error;
pub mod factory;
#[cfg(test)]
pub mod mock;
pub mod openai;

pub use error::ProviderError;
pub use factory::{OpenAiConfig, OpenRouterConfig, ProviderConfig, ProviderFactory};
pub use openai::GenericOpenAiProvider;

/// One turn as the provider sees it: no timestamps, just who said what
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the reply to `messages`, oldest turn first
    async fn chat(&self, messages: Vec<LlmMessage>, model: &str) -> Result<String, ProviderError>;

    fn default_model(&self) -> String;

    fn provider_name(&self) -> &'static str;
}
