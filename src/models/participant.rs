//! Session membership model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a user holds inside a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Created the session; exactly one per session.
    Owner,
    /// Joined directly or through an accepted invite.
    Member,
}

impl ParticipantRole {
    /// Database representation of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

/// Unique `(session_id, user_id)` membership row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Participant {
    /// Session joined.
    pub session_id: String,
    /// Member user id.
    pub user_id: String,
    /// Owner or member.
    pub role: ParticipantRole,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Construct a participant joining now.
    #[must_use]
    pub fn new(session_id: String, user_id: String, role: ParticipantRole) -> Self {
        Self {
            session_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}
