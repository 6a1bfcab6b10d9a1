//! Session invite model and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invite lifecycle: `pending` then exactly one terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// Awaiting the invitee's answer.
    Pending,
    /// Invitee joined the session.
    Accepted,
    /// Invitee turned the invite down.
    Declined,
}

impl InviteStatus {
    /// Database representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    /// Whether no further response is accepted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Invitee's answer to an invite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InviteDecision {
    /// Join the session.
    Accept,
    /// Turn the invite down.
    Decline,
}

impl InviteDecision {
    /// Terminal status reached by this decision.
    #[must_use]
    pub fn target_status(self) -> InviteStatus {
        match self {
            Self::Accept => InviteStatus::Accepted,
            Self::Decline => InviteStatus::Declined,
        }
    }
}

/// Invitation of one user into one session; unique per `(session_id, invitee_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Invite {
    /// Unique record identifier.
    pub id: String,
    /// Target session.
    pub session_id: String,
    /// Session owner who (re)sent the invite.
    pub inviter_id: String,
    /// Invited user.
    pub invitee_id: String,
    /// Current state.
    pub status: InviteStatus,
    /// First creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set once the invitee answers.
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invite {
    /// Construct a new pending invite.
    #[must_use]
    pub fn new(session_id: String, inviter_id: String, invitee_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            inviter_id,
            invitee_id,
            status: InviteStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    /// Whether a decision may still be recorded.
    #[must_use]
    pub fn can_respond(&self) -> bool {
        self.status == InviteStatus::Pending
    }
}
