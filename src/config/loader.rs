use crate::config::schema::Config;
use crate::providers::ProviderConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Values given on the command line; they win over every other layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
    pub model: Option<String>,
}

/// Builds the configuration: defaults, then file, then env, then CLI
pub fn load_config(cli: &CliOverrides) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: config file (~/.diaschat/config.json)
    let config_file = cli.config_path.clone().or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = merge_config_from_file(config, path)?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment
    config = merge_env_variables(config);

    // Layer 3: CLI flags
    if let Some(ref history) = cli.history_path {
        tracing::debug!(history_path = %history.display(), "Applying CLI history override");
        config.history_path = Some(history.clone());
    }

    if let Some(ref model) = cli.model {
        match config.provider_config {
            Some(ref mut provider_config) => {
                tracing::debug!(model = %model, "Applying CLI model override");
                provider_config.set_default_model(model.clone());
            }
            None => tracing::debug!(model = %model, "Ignoring model override, no provider configured"),
        }
    }

    let summary = config.get_safe_summary();
    tracing::debug!(
        provider = summary.provider,
        model = ?summary.model,
        history_path = %summary.history_path.display(),
        retention_days = summary.retention_days,
        prune_on_start = summary.prune_on_start,
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".diaschat").join("config.json"))
}

fn merge_config_from_file(config: Config, path: &Path) -> Result<Config> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
        Err(e) => return Err(e).context("Failed to read metadata for config file"),
    };

    // The file may hold an API key
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode() & 0o777;
        if mode != 0o600 {
            tracing::error!(
                "Config file {:?} has permissions {:o}, expected 0600 - skipping for security",
                path,
                mode
            );
            return Ok(config);
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let file_config: Config = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;

    Ok(Config {
        history_path: file_config.history_path.or(config.history_path),
        retention_days: file_config.retention_days.or(config.retention_days),
        prune_on_start: file_config.prune_on_start,
        provider_config: file_config.provider_config.or(config.provider_config),
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn merge_env_variables(config: Config) -> Config {
    let env_provider_config = if let Some(key) = non_empty_env("OPENAI_API_KEY") {
        Some(ProviderConfig::openai(key))
    } else {
        non_empty_env("OPENROUTER_API_KEY")
            .or_else(|| non_empty_env("DIASCHAT_API_KEY"))
            .map(ProviderConfig::openrouter)
    };

    let retention_days = match non_empty_env("DIASCHAT_RETENTION_DAYS") {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(days) => Some(days),
            Err(_) => {
                tracing::warn!(value = %raw, "Ignoring invalid DIASCHAT_RETENTION_DAYS");
                config.retention_days
            }
        },
        None => config.retention_days,
    };

    Config {
        history_path: non_empty_env("DIASCHAT_HISTORY")
            .map(PathBuf::from)
            .or(config.history_path),
        retention_days,
        prune_on_start: config.prune_on_start,
        provider_config: env_provider_config.or(config.provider_config),
    }
}

#[cfg(test)]
fn clear_env() {
    unsafe {
        for name in [
            "OPENAI_API_KEY",
            "OPENROUTER_API_KEY",
            "DIASCHAT_API_KEY",
            "DIASCHAT_HISTORY",
            "DIASCHAT_RETENTION_DAYS",
        ] {
            std::env::remove_var(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    fn write_config(config: &Config, path: &Path) {
        fs::write(path, serde_json::to_string_pretty(config).unwrap()).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).unwrap();
        }
    }

    fn overrides(config_path: PathBuf) -> CliOverrides {
        CliOverrides {
            config_path: Some(config_path),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn test_load_config_defaults() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config = load_config(&overrides(temp_dir.path().join("missing.json"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let file_config = Config {
            history_path: Some(PathBuf::from("/data/history.json")),
            retention_days: Some(30),
            prune_on_start: true,
            provider_config: Some(ProviderConfig::openrouter("file-key")),
        };
        write_config(&file_config, &config_path);

        let loaded = load_config(&overrides(config_path)).unwrap();
        assert_eq!(loaded, file_config);
    }

    #[test]
    fn test_load_config_invalid_json() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, "not valid json").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600)).unwrap();
        }

        let err = load_config(&overrides(config_path)).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[cfg(unix)]
    #[test]
    fn test_world_readable_config_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let file_config = Config {
            retention_days: Some(9),
            ..Config::default()
        };
        write_config(&file_config, &config_path);
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o644)).unwrap();

        let loaded = load_config(&overrides(config_path)).unwrap();
        assert_eq!(loaded.retention_days, None);
    }

    #[test]
    fn test_env_variable_override() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let file_config = Config {
            history_path: Some(PathBuf::from("file.json")),
            provider_config: Some(ProviderConfig::openrouter("file-key")),
            ..Config::default()
        };
        write_config(&file_config, &config_path);

        unsafe {
            env::set_var("OPENAI_API_KEY", "env-key");
            env::set_var("DIASCHAT_HISTORY", "env.json");
            env::set_var("DIASCHAT_RETENTION_DAYS", "2");
        }

        let config = load_config(&overrides(config_path)).unwrap();
        assert_eq!(config.provider_config, Some(ProviderConfig::openai("env-key")));
        assert_eq!(config.history_path, Some(PathBuf::from("env.json")));
        assert_eq!(config.retention_days, Some(2));

        clear_env();
    }

    #[test]
    fn test_invalid_retention_env_ignored() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        unsafe {
            env::set_var("DIASCHAT_RETENTION_DAYS", "a week");
        }

        let config = load_config(&overrides(temp_dir.path().join("missing.json"))).unwrap();
        assert_eq!(config.retention_days, None);

        clear_env();
    }

    #[test]
    fn test_cli_flag_override() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let file_config = Config {
            history_path: Some(PathBuf::from("file.json")),
            provider_config: Some(ProviderConfig::openai("file-key")),
            ..Config::default()
        };
        write_config(&file_config, &config_path);

        unsafe {
            env::set_var("DIASCHAT_HISTORY", "env.json");
        }

        let cli = CliOverrides {
            config_path: Some(config_path),
            history_path: Some(PathBuf::from("cli.json")),
            model: Some("cli-model".to_string()),
        };
        let config = load_config(&cli).unwrap();

        // CLI > Env > File > Defaults
        assert_eq!(config.history_path, Some(PathBuf::from("cli.json")));
        assert_eq!(
            config.provider_config.as_ref().unwrap().default_model(),
            "cli-model"
        );

        clear_env();
    }
}
