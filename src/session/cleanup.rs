//! Retention-based pruning of old turns
//!
//! Age is measured from each message's `created_at` instant. The time-of-day
//! `timestamp` carries no date and cannot tell "five days ago" from "this
//! morning", so it is never used for pruning. Messages without `created_at`
//! (written by older versions) have no known age and are kept.

use crate::session::types::Message;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Retention window used when none is configured (5 days)
pub const DEFAULT_RETENTION_DAYS: u32 = 5;

/// Checks if a message recorded at `created_at` is older than `retention`
pub fn is_expired(created_at: DateTime<Utc>, retention: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(created_at) > retention
}

/// Builds a retention window from a day count
pub fn retention_days(days: u32) -> Duration {
    Duration::days(i64::from(days))
}

/// Removes expired messages in place, preserving the order of the rest
pub fn prune_messages(
    messages: &mut Vec<Message>,
    retention: Duration,
    now: DateTime<Utc>,
) -> PruneResult {
    let scanned = messages.len();
    let mut undated_kept = 0;

    messages.retain(|message| match message.created_at {
        Some(created_at) => !is_expired(created_at, retention, now),
        None => {
            undated_kept += 1;
            true
        }
    });

    let result = PruneResult {
        scanned,
        removed: scanned - messages.len(),
        undated_kept,
    };

    if undated_kept > 0 {
        warn!(
            undated_kept = undated_kept,
            "Kept messages without a recorded date; their age is unknown"
        );
    }

    match now.checked_sub_signed(retention) {
        Some(cutoff) => debug!(
            retention_hours = retention.num_hours(),
            cutoff = %cutoff,
            "Prune cutoff computed"
        ),
        None => debug!(
            retention_hours = retention.num_hours(),
            "Prune cutoff precedes the earliest representable date"
        ),
    }
    info!(
        scanned = result.scanned,
        removed = result.removed,
        undated_kept = result.undated_kept,
        "History prune complete"
    );

    result
}

/// Result of a prune operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneResult {
    /// Messages examined
    pub scanned: usize,
    /// Messages removed as expired
    pub removed: usize,
    /// Messages kept because they have no date
    pub undated_kept: usize,
}
