pub mod cleanup;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod types;

pub use cleanup::{DEFAULT_RETENTION_DAYS, PruneResult, retention_days};
pub use error::PersistenceError;
pub use manager::SessionManager;
pub use persistence::{DEFAULT_HISTORY_FILE, HistoryFile};
pub use types::{Message, Role, TIMESTAMP_FORMAT};
