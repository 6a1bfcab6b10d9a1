//! Client-facing projections assembled from several tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::{Channel, ChannelStatus};
use super::invite::{Invite, InviteStatus};
use super::participant::ParticipantRole;
use super::session::{Session, SessionStatus};
use super::stats::CpuStats;
use super::user::UserSummary;

/// Fully joined, flat view of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Canonical session id.
    pub id: String,
    /// Immutable alias.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Owner id.
    pub owner_id: String,
    /// Owner projection.
    pub owner: UserSummary,
    /// Annotated master.
    pub master_code: String,
    /// Executable stacked master.
    pub merged_stack: String,
    /// Extra debounce latency.
    pub apply_delay_ms: i64,
    /// Recent resource samples.
    pub cpu_stats: CpuStats,
    /// Opaque client settings.
    pub settings: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Members ordered by join time.
    pub participants: Vec<ParticipantView>,
    /// Channels ordered by status then recency, both descending.
    pub channels: Vec<ChannelView>,
}

impl SessionSnapshot {
    /// Flatten a session and its joined rows into one structure.
    #[must_use]
    pub fn assemble(
        session: Session,
        owner: UserSummary,
        participants: Vec<ParticipantView>,
        channels: Vec<ChannelView>,
    ) -> Self {
        Self {
            id: session.id,
            slug: session.slug,
            title: session.title,
            status: session.status,
            owner_id: session.owner_id,
            owner,
            master_code: session.master_code,
            merged_stack: session.merged_stack,
            apply_delay_ms: session.apply_delay_ms,
            cpu_stats: session.cpu_stats,
            settings: session.settings,
            created_at: session.created_at,
            updated_at: session.updated_at,
            participants,
            channels,
        }
    }

    /// Whether the user is a participant of the session.
    #[must_use]
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user.id == user_id)
    }
}

/// Participant with a minimal user projection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    /// Member projection.
    pub user: UserSummary,
    /// Owner or member.
    pub role: ParticipantRole,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

/// Channel with its author projection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    /// Channel id.
    pub id: String,
    /// Author projection.
    pub author: UserSummary,
    /// External element reference.
    pub element_id: Option<String>,
    /// Label.
    pub name: Option<String>,
    /// Publication status.
    pub status: ChannelStatus,
    /// Pattern source.
    pub code: String,
    /// Gain.
    pub volume: f64,
    /// Stereo position.
    pub pan: f64,
    /// Opaque metadata.
    pub metadata: serde_json::Value,
    /// Last recomputation that included this channel.
    pub last_evaluated_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ChannelView {
    /// Attach an author projection to a channel record.
    #[must_use]
    pub fn new(channel: Channel, author: UserSummary) -> Self {
        Self {
            id: channel.id,
            author,
            element_id: channel.element_id,
            name: channel.name,
            status: channel.status,
            code: channel.code,
            volume: channel.volume,
            pan: channel.pan,
            metadata: channel.metadata,
            last_evaluated_at: channel.last_evaluated_at,
            created_at: channel.created_at,
            updated_at: channel.updated_at,
        }
    }
}

/// Output of a merge, or of a manual override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MasterUpdate {
    /// Annotated, editor-facing master.
    pub master_code: String,
    /// Executable stacked master.
    pub merged_stack: String,
}

/// Row of `list_recent_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session id.
    pub id: String,
    /// Session slug.
    pub slug: String,
    /// Session title.
    pub title: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Owner id.
    pub owner_id: String,
    /// Caller's role in the session.
    pub role: ParticipantRole,
    /// Number of participants.
    pub participant_count: i64,
    /// Number of channels.
    pub channel_count: i64,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row of `list_user_invites`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    /// Invite id.
    pub id: String,
    /// Invite status.
    pub status: InviteStatus,
    /// Target session id.
    pub session_id: String,
    /// Target session slug.
    pub session_slug: String,
    /// Target session title.
    pub session_title: String,
    /// Inviter projection.
    pub inviter: UserSummary,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Result of `respond_to_invite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    /// Invite after the response; unchanged when it was already terminal.
    pub invite: Invite,
    /// Refreshed snapshot when the response joined the session.
    pub snapshot: Option<SessionSnapshot>,
}
