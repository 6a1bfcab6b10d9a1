//! Domain model module declarations.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

pub mod channel;
pub mod invite;
pub mod participant;
pub mod revision;
pub mod session;
pub mod snapshot;
pub mod stats;
pub mod user;

/// Parse an RFC 3339 timestamp column into a UTC datetime.
pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {column}: {e}")))
}

/// Parse an optional RFC 3339 timestamp column.
pub(crate) fn parse_optional_timestamp(
    column: &str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(column, s)).transpose()
}

/// Format a timestamp with fixed precision so text columns sort chronologically.
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time formatted for storage.
pub(crate) fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}
