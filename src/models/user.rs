//! Minimal mirror of identities owned by the external identity provider.

use serde::{Deserialize, Serialize};

/// Display name used when no account record exists.
pub const ANONYMOUS: &str = "anonymous";

/// User account as known to this service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Identity-provider user id.
    pub id: String,
    /// Account name.
    pub name: Option<String>,
    /// Preferred artist name.
    pub artist_name: Option<String>,
}

impl UserSummary {
    /// Projection for a user id with no account record.
    #[must_use]
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            artist_name: None,
        }
    }

    /// Artist name, else account name, else `anonymous`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        non_blank(self.artist_name.as_deref())
            .or_else(|| non_blank(self.name.as_deref()))
            .unwrap_or(ANONYMOUS)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
