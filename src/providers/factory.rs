//! Provider configuration and construction

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::providers::{GenericOpenAiProvider, LlmProvider, ProviderError};

/// Configuration for the native OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub default_model: String,
    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Configuration for OpenRouter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenRouterConfig {
    pub api_key: String,
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    #[serde(default = "default_openrouter_model")]
    pub default_model: String,
    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openrouter_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn validate_fields(
    name: &str,
    api_key: &str,
    base_url: &str,
    default_model: &str,
) -> Result<(), ProviderError> {
    if api_key.is_empty() {
        return Err(ProviderError::config(format!("{} API key is required", name)));
    }
    if base_url.is_empty() {
        return Err(ProviderError::config(format!(
            "{} base URL cannot be empty",
            name
        )));
    }
    if default_model.is_empty() {
        return Err(ProviderError::config(format!(
            "{} default model cannot be empty",
            name
        )));
    }
    Ok(())
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_openai_base_url(),
            default_model: default_openai_model(),
            timeout_seconds: default_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        validate_fields("OpenAI", &self.api_key, &self.base_url, &self.default_model)
    }
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_openrouter_base_url(),
            default_model: default_openrouter_model(),
            timeout_seconds: default_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        validate_fields(
            "OpenRouter",
            &self.api_key,
            &self.base_url,
            &self.default_model,
        )
    }
}

/// Provider configuration variants, tagged by `type` in JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    #[serde(rename = "openai")]
    OpenAi(OpenAiConfig),
    #[serde(rename = "openrouter")]
    OpenRouter(OpenRouterConfig),
}

impl ProviderConfig {
    pub fn provider_type(&self) -> &'static str {
        match self {
            ProviderConfig::OpenAi(_) => "openai",
            ProviderConfig::OpenRouter(_) => "openrouter",
        }
    }

    pub fn default_model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(cfg) => &cfg.default_model,
            ProviderConfig::OpenRouter(cfg) => &cfg.default_model,
        }
    }

    pub fn set_default_model(&mut self, model: impl Into<String>) {
        match self {
            ProviderConfig::OpenAi(cfg) => cfg.default_model = model.into(),
            ProviderConfig::OpenRouter(cfg) => cfg.default_model = model.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        match self {
            ProviderConfig::OpenAi(config) => config.validate(),
            ProviderConfig::OpenRouter(config) => config.validate(),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::OpenAi(OpenAiConfig::new(api_key))
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::OpenRouter(OpenRouterConfig::new(api_key))
    }
}

/// Builds providers from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Validates `config` and creates the matching provider
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        config.validate()?;

        let provider = match config {
            ProviderConfig::OpenAi(cfg) => GenericOpenAiProvider::try_from_config(cfg, "openai")?,
            ProviderConfig::OpenRouter(cfg) => {
                GenericOpenAiProvider::try_from_config(cfg, "openrouter")?
            }
        };

        tracing::debug!(
            provider = provider.provider_name(),
            model = %config.default_model(),
            "Created completion provider"
        );
        Ok(Arc::new(provider))
    }
}
