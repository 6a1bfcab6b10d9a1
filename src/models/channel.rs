//! Channel model: one participant's independently editable code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Publication status of a channel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Work in progress; excluded from the master.
    #[default]
    Draft,
    /// Playing in the master.
    Live,
    /// Playing in the master and shared publicly.
    Published,
}

impl ChannelStatus {
    /// Whether channels in this status contribute to the master.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live | Self::Published)
    }

    /// Database representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Live => "live",
            Self::Published => "published",
        }
    }
}

/// A channel of pattern code inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Channel {
    /// Unique record identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Author.
    pub user_id: String,
    /// Optional external element reference.
    pub element_id: Option<String>,
    /// Label shown in the master.
    pub name: Option<String>,
    /// Publication status.
    pub status: ChannelStatus,
    /// Trimmed, never empty.
    pub code: String,
    /// Gain in `[0.0, 1.0]`.
    pub volume: f64,
    /// Stereo position in `[-1.0, 1.0]`.
    pub pan: f64,
    /// Opaque client metadata.
    pub metadata: serde_json::Value,
    /// Last recomputation that included this channel.
    pub last_evaluated_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for `upsert_channel`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPayload {
    /// Existing channel to update.
    #[serde(default)]
    pub id: Option<String>,
    /// External element reference; also used to find an existing channel.
    #[serde(default)]
    pub element_id: Option<String>,
    /// Channel label.
    #[serde(default)]
    pub name: Option<String>,
    /// Requested status; keeps the current one (or `draft`) when absent.
    #[serde(default)]
    pub status: Option<ChannelStatus>,
    /// Pattern source.
    pub code: String,
    /// Gain; defaults to `1.0`.
    #[serde(default)]
    pub volume: Option<f64>,
    /// Stereo position; defaults to `0.0`.
    #[serde(default)]
    pub pan: Option<f64>,
    /// Opaque metadata; defaults to `{}`.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ChannelPayload {
    /// Payload carrying only code; handy for tests and the CLI.
    #[must_use]
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Trimmed code, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when nothing remains after trimming.
    pub fn validated_code(&self) -> Result<&str> {
        let code = self.code.trim();
        if code.is_empty() {
            return Err(AppError::Validation("channel code must not be empty".into()));
        }
        Ok(code)
    }
}

impl Channel {
    /// Build a new channel from a validated payload.
    #[must_use]
    pub fn from_payload(
        session_id: String,
        user_id: String,
        payload: &ChannelPayload,
        code: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            user_id,
            element_id: blank_to_none(payload.element_id.as_deref()),
            name: blank_to_none(payload.name.as_deref()),
            status: payload.status.unwrap_or_default(),
            code: code.to_owned(),
            volume: clamp_volume(payload.volume.unwrap_or(1.0)),
            pan: clamp_pan(payload.pan.unwrap_or(0.0)),
            metadata: payload
                .metadata
                .clone()
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            last_evaluated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a validated payload onto an existing channel.
    ///
    /// Fields absent from the payload keep their current value.
    pub fn apply_payload(&mut self, payload: &ChannelPayload, code: &str) {
        if let Some(element_id) = payload.element_id.as_deref() {
            self.element_id = blank_to_none(Some(element_id));
        }
        if let Some(name) = payload.name.as_deref() {
            self.name = blank_to_none(Some(name));
        }
        if let Some(status) = payload.status {
            self.status = status;
        }
        if let Some(volume) = payload.volume {
            self.volume = clamp_volume(volume);
        }
        if let Some(pan) = payload.pan {
            self.pan = clamp_pan(pan);
        }
        if let Some(metadata) = payload.metadata.clone() {
            self.metadata = metadata;
        }
        code.clone_into(&mut self.code);
        self.updated_at = Utc::now();
    }
}

/// Clamp a gain value into `[0.0, 1.0]`; non-finite input becomes `1.0`.
#[must_use]
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Clamp a pan value into `[-1.0, 1.0]`; non-finite input becomes centre.
#[must_use]
pub fn clamp_pan(pan: f64) -> f64 {
    if pan.is_finite() {
        pan.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
