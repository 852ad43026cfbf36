use crate::providers::LlmMessage;
use crate::session::cleanup::{self, PruneResult};
use crate::session::error::PersistenceError;
use crate::session::persistence::HistoryFile;
use crate::session::types::{Message, Role};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, error, info};

type Result<T> = std::result::Result<T, PersistenceError>;

/// Owns the ordered conversation log
///
/// Mutation goes through `&mut self`, so whoever owns the manager is the
/// only writer. Background work gets a snapshot via [`to_llm_messages`].
///
/// [`to_llm_messages`]: SessionManager::to_llm_messages
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionManager {
    messages: Vec<Message>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manager around an existing log
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Reads the log from `path`; a missing file gives an empty log
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let messages = HistoryFile::new(path.as_ref()).load().await?;
        Ok(Self { messages })
    }

    /// Loads the log, falling back to empty if the file cannot be used
    ///
    /// A corrupt file is moved aside under a `.corrupted` name before returning so
    /// the next save does not destroy it.
    pub async fn open_or_recover(path: impl AsRef<Path>) -> Self {
        let file = HistoryFile::new(path.as_ref());
        match file.load().await {
            Ok(messages) => Self { messages },
            Err(e) if e.is_corrupt() => {
                error!(error = %e, "Chat history is corrupt, starting with an empty log");
                if let Err(e) = file.quarantine().await {
                    error!(error = %e, "Failed to move corrupt history aside");
                }
                Self::new()
            }
            Err(e) => {
                error!(error = %e, "Chat history is unreadable, starting with an empty log");
                Self::new()
            }
        }
    }

    /// Writes the whole log to `path`, replacing its content
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        HistoryFile::new(path.as_ref()).save(&self.messages).await
    }

    /// Records a new turn stamped with the current time
    ///
    /// User turns must carry text; callers filter blank input first (see
    /// `ChatApp::submit`). Assistant turns may be empty.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Message {
        let message = Message::new(role, content);
        debug_assert!(
            !(message.is_user() && message.content.is_empty()),
            "user turns must not be empty"
        );
        debug!(role = %message.role, timestamp = %message.timestamp, "Appending turn");
        self.messages.push(message.clone());
        message
    }

    /// Drops every turn older than `retention`
    pub fn prune(&mut self, retention: Duration) -> PruneResult {
        self.prune_at(retention, Utc::now())
    }

    /// Same as [`prune`](SessionManager::prune) against a fixed "now"
    pub fn prune_at(&mut self, retention: Duration, now: DateTime<Utc>) -> PruneResult {
        cleanup::prune_messages(&mut self.messages, retention, now)
    }

    pub fn clear(&mut self) {
        if !self.messages.is_empty() {
            info!(removed = self.messages.len(), "Clearing chat history");
        }
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Snapshot of the log as provider role/content pairs, in order
    pub fn to_llm_messages(&self) -> Vec<LlmMessage> {
        self.messages.iter().map(Message::to_llm_message).collect()
    }
}
