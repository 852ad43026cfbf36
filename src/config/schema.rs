use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::providers::ProviderConfig;
use crate::session::{DEFAULT_HISTORY_FILE, DEFAULT_RETENTION_DAYS};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Where the conversation log lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,

    /// Age in days after which turns are pruned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,

    /// Prune with `retention_days` every time the history is opened
    #[serde(default)]
    pub prune_on_start: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<ProviderConfig>,
}

impl Config {
    pub fn history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE))
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)
    }

    /// Config summary that is safe to log
    pub fn get_safe_summary(&self) -> ConfigSummary {
        ConfigSummary {
            provider: self
                .provider_config
                .as_ref()
                .map(|p| p.provider_type())
                .unwrap_or("none"),
            model: self
                .provider_config
                .as_ref()
                .map(|p| p.default_model().to_string()),
            history_path: self.history_path(),
            retention_days: self.retention_days(),
            prune_on_start: self.prune_on_start,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigSummary {
    pub provider: &'static str,
    pub model: Option<String>,
    pub history_path: PathBuf,
    pub retention_days: u32,
    pub prune_on_start: bool,
}
