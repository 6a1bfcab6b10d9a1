//! Jam session model, status lifecycle and slug helpers.

use chrono::{DateTime, Utc};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stats::CpuStats;

/// Maximum length of the title-derived part of a slug.
const SLUG_BASE_MAX_LEN: usize = 40;

/// Length of the random hex suffix appended to every slug.
const SLUG_SUFFIX_LEN: usize = 6;

#[allow(clippy::expect_used)]
static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug separator pattern is valid"));

/// Lifecycle status for a jam session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Open for joining, channel edits and invites.
    Active,
    /// Closed by the owner; readable but no longer editable.
    Closed,
}

impl SessionStatus {
    /// Database representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// A collaborative jam session persisted in `SQLite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Unique record identifier.
    pub id: String,
    /// Human-readable alias; immutable once assigned.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Owning user; immutable after creation.
    pub owner_id: String,
    /// Annotated merge of all live channels, or a manual override.
    pub master_code: String,
    /// Executable `stack(...)` form of the same merge.
    pub merged_stack: String,
    /// Extra latency before recomputing, always within `[0, 5000]`.
    pub apply_delay_ms: i64,
    /// Bounded history of resource samples.
    pub cpu_stats: CpuStats,
    /// Opaque client settings.
    pub settings: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a new active session with an empty master.
    #[must_use]
    pub fn new(owner_id: String, title: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            slug,
            title,
            status: SessionStatus::Active,
            owner_id,
            master_code: String::new(),
            merged_stack: String::new(),
            apply_delay_ms: 0,
            cpu_stats: CpuStats::default(),
            settings: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the given user owns this session.
    #[must_use]
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Whether the session still accepts edits.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Reduce a title to a lowercase, dash-separated slug base.
///
/// Runs of non-alphanumeric characters collapse into a single `-`. An
/// empty result falls back to `session`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let collapsed = SLUG_SEPARATORS.replace_all(&lowered, "-");

    let truncated: String = collapsed
        .trim_matches('-')
        .chars()
        .take(SLUG_BASE_MAX_LEN)
        .collect();
    let base = truncated.trim_end_matches('-');

    if base.is_empty() {
        "session".to_owned()
    } else {
        base.to_owned()
    }
}

/// Build a fresh slug candidate: `slugify(title)` plus a random hex suffix.
#[must_use]
pub fn generate_slug(title: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SLUG_SUFFIX_LEN)
        .collect();
    format!("{}-{suffix}", slugify(title))
}
