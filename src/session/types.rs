use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::providers::LlmMessage;

/// Wall-clock format of the `timestamp` field (time of day, no date)
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation
///
/// `timestamp` is the local time of day the turn was recorded. `created_at`
/// is the full instant and is what retention pruning looks at; it is absent
/// in history files written before it existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    /// Creates a message recorded at a given instant
    pub fn at(role: Role, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let timestamp = created_at
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string();
        Self {
            role,
            content: content.into(),
            timestamp,
            created_at: Some(created_at),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// True when the message predates `created_at` and has no usable age
    pub fn is_undated(&self) -> bool {
        self.created_at.is_none()
    }

    pub fn to_llm_message(&self) -> LlmMessage {
        LlmMessage::new(self.role, self.content.clone())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timestamp.is_empty() {
            write!(f, "{}: {}", self.role, self.content)
        } else {
            write!(f, "{} ({}): {}", self.role, self.timestamp, self.content)
        }
    }
}
