use crate::session::error::PersistenceError;
use crate::session::types::Message;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

type Result<T> = std::result::Result<T, PersistenceError>;

/// Default history location, relative to the working directory
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.json";

/// Reads and writes the conversation log as a single JSON array
pub struct HistoryFile {
    pub path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads every message from the file
    ///
    /// A missing file is an empty history, not an error.
    pub async fn load(&self) -> Result<Vec<Message>> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No history file, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let messages: Vec<Message> =
            serde_json::from_str(&json).map_err(|source| PersistenceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        info!(
            path = %self.path.display(),
            messages = messages.len(),
            "Loaded chat history"
        );
        Ok(messages)
    }

    /// Overwrites the file with the full log
    pub async fn save(&self, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string_pretty(messages).map_err(PersistenceError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| self.write_error(source))?;
        }

        fs::write(&self.path, json)
            .await
            .map_err(|source| self.write_error(source))?;

        // History is private conversation text
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions)
                .await
                .map_err(|source| self.write_error(source))?;
        }

        info!(
            path = %self.path.display(),
            messages = messages.len(),
            "Saved chat history"
        );
        Ok(())
    }

    /// Moves an unreadable history file out of the way
    ///
    /// Returns the new location. Later saves then start a fresh file instead
    /// of overwriting the old content. Earlier quarantined files are never
    /// replaced: the first free name of `<file>.corrupted`,
    /// `<file>.corrupted.1`, `<file>.corrupted.2`, ... is used.
    pub async fn quarantine(&self) -> Result<PathBuf> {
        let corrupted_path = self.free_corrupted_path().await?;

        fs::rename(&self.path, &corrupted_path)
            .await
            .map_err(|source| self.write_error(source))?;

        error!(
            "Corrupted history file detected. Moved {:?} to {:?}",
            self.path, corrupted_path
        );
        Ok(corrupted_path)
    }

    async fn free_corrupted_path(&self) -> Result<PathBuf> {
        let mut suffix = 0u32;
        loop {
            let candidate = corrupted_path(&self.path, suffix);
            let taken = fs::try_exists(&candidate)
                .await
                .map_err(|source| self.write_error(source))?;
            if !taken {
                return Ok(candidate);
            }
            debug!(path = %candidate.display(), "Quarantine name already taken");
            suffix += 1;
        }
    }

    fn write_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

fn corrupted_path(path: &Path, suffix: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupted");
    if suffix > 0 {
        name.push(format!(".{}", suffix));
    }
    PathBuf::from(name)
}
