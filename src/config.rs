//! Global configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Snapshot cache tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Age after which a cached snapshot is reloaded from the database.
    #[serde(default = "default_snapshot_ttl_ms")]
    pub snapshot_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_ms: default_snapshot_ttl_ms(),
        }
    }
}

/// Debounced master recomputation timing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RefreshConfig {
    /// Fixed debounce applied to every scheduled refresh.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for a session's `apply_delay_ms`.
    #[serde(default = "default_max_apply_delay_ms")]
    pub max_apply_delay_ms: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_apply_delay_ms: default_max_apply_delay_ms(),
        }
    }
}

/// Resource sampler thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SamplerConfig {
    /// One-minute load average above which a sample carries a warning.
    #[serde(default = "default_load_warning_threshold")]
    pub load_warning_threshold: f64,
    /// Heap usage above which a sample carries a warning.
    #[serde(default = "default_heap_warning_bytes")]
    pub heap_warning_bytes: u64,
    /// Number of samples retained per session.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            load_warning_threshold: default_load_warning_threshold(),
            heap_warning_bytes: default_heap_warning_bytes(),
            history_len: default_history_len(),
        }
    }
}

/// Invite limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InviteConfig {
    /// Maximum invitees accepted per `send_invites` call.
    #[serde(default = "default_max_invites_per_call")]
    pub max_per_call: usize,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            max_per_call: default_max_invites_per_call(),
        }
    }
}

/// Session listing limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionListConfig {
    /// Limit used when the caller does not provide one.
    #[serde(default = "default_recent_limit")]
    pub default_recent_limit: u32,
    /// Hard cap on the number of sessions returned.
    #[serde(default = "default_max_recent_limit")]
    pub max_recent_limit: u32,
}

impl Default for SessionListConfig {
    fn default() -> Self {
        Self {
            default_recent_limit: default_recent_limit(),
            max_recent_limit: default_max_recent_limit(),
        }
    }
}

fn default_database_path() -> String {
    "pattern-jam.db".into()
}

fn default_snapshot_ttl_ms() -> u64 {
    5_000
}

fn default_base_delay_ms() -> u64 {
    150
}

/// Upper bound enforced by the `jam_session.apply_delay_ms` check constraint.
pub const APPLY_DELAY_CEILING_MS: i64 = 5_000;

fn default_max_apply_delay_ms() -> i64 {
    APPLY_DELAY_CEILING_MS
}

fn default_load_warning_threshold() -> f64 {
    4.0
}

fn default_heap_warning_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_history_len() -> usize {
    10
}

fn default_max_invites_per_call() -> usize {
    5
}

fn default_recent_limit() -> u32 {
    10
}

fn default_max_recent_limit() -> u32 {
    50
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file, or `:memory:` for an ephemeral store.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Snapshot cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Debounce settings.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Resource sampler settings.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Invite limits.
    #[serde(default)]
    pub invites: InviteConfig,
    /// Session listing limits.
    #[serde(default)]
    pub sessions: SessionListConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            sampler: SamplerConfig::default(),
            invites: InviteConfig::default(),
            sessions: SessionListConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether the configured database lives only in memory.
    #[must_use]
    pub fn is_memory_database(&self) -> bool {
        self.database_path == ":memory:"
    }

    /// Snapshot time-to-live as a [`Duration`].
    #[must_use]
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.snapshot_ttl_ms)
    }

    /// Fixed debounce delay as a [`Duration`].
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.refresh.base_delay_ms)
    }

    /// Clamp a requested apply delay into `[0, max_apply_delay_ms]`.
    #[must_use]
    pub fn clamp_apply_delay(&self, ms: i64) -> i64 {
        ms.clamp(0, self.refresh.max_apply_delay_ms)
    }

    /// Clamp a caller-supplied listing limit.
    #[must_use]
    pub fn clamp_recent_limit(&self, limit: Option<u32>) -> u32 {
        limit
            .unwrap_or(self.sessions.default_recent_limit)
            .clamp(1, self.sessions.max_recent_limit)
    }

    fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            return Err(AppError::Config("database_path must not be empty".into()));
        }

        if !(0..=APPLY_DELAY_CEILING_MS).contains(&self.refresh.max_apply_delay_ms) {
            return Err(AppError::Config(format!(
                "refresh.max_apply_delay_ms must be within 0..={APPLY_DELAY_CEILING_MS}"
            )));
        }

        if self.sampler.history_len == 0 {
            return Err(AppError::Config(
                "sampler.history_len must be greater than zero".into(),
            ));
        }

        if !self.sampler.load_warning_threshold.is_finite()
            || self.sampler.load_warning_threshold <= 0.0
        {
            return Err(AppError::Config(
                "sampler.load_warning_threshold must be a positive number".into(),
            ));
        }

        if self.invites.max_per_call == 0 {
            return Err(AppError::Config(
                "invites.max_per_call must be greater than zero".into(),
            ));
        }

        if self.sessions.max_recent_limit == 0 {
            return Err(AppError::Config(
                "sessions.max_recent_limit must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
