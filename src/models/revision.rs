//! Append-only channel revision log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successful channel write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChannelRevision {
    /// Autoincrement row id.
    pub id: i64,
    /// Channel written.
    pub channel_id: String,
    /// Session the channel belongs to.
    pub session_id: String,
    /// Author of the write.
    pub user_id: String,
    /// Code as stored by the write.
    pub code: String,
    /// Whether the channel was live when written.
    pub applied_to_master: bool,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}
