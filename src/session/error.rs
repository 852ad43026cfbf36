//! Errors raised while reading or writing the history file

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The file exists but could not be read
    #[error("Failed to read history file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but does not hold a valid message array
    #[error("History file {path:?} contains invalid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file (or its parent directory) could not be written
    #[error("Failed to write history file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl PersistenceError {
    /// Returns true if the file content itself is the problem
    pub fn is_corrupt(&self) -> bool {
        matches!(self, PersistenceError::Parse { .. })
    }
}
