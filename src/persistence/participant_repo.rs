//! Participant repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::participant::{Participant, ParticipantRole};
use crate::models::snapshot::ParticipantView;
use crate::models::user::UserSummary;
use crate::models::{format_timestamp, parse_timestamp};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for session membership rows.
#[derive(Clone)]
pub struct ParticipantRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ParticipantRow {
    session_id: String,
    user_id: String,
    role: String,
    joined_at: String,
}

impl ParticipantRow {
    fn into_participant(self) -> Result<Participant> {
        Ok(Participant {
            session_id: self.session_id,
            user_id: self.user_id,
            role: parse_role(&self.role)?,
            joined_at: parse_timestamp("joined_at", &self.joined_at)?,
        })
    }
}

/// Participant joined with the minimal user projection.
#[derive(sqlx::FromRow)]
struct ParticipantViewRow {
    user_id: String,
    role: String,
    joined_at: String,
    user_name: Option<String>,
    user_artist_name: Option<String>,
}

impl ParticipantViewRow {
    fn into_view(self) -> Result<ParticipantView> {
        Ok(ParticipantView {
            user: UserSummary {
                id: self.user_id,
                name: self.user_name,
                artist_name: self.user_artist_name,
            },
            role: parse_role(&self.role)?,
            joined_at: parse_timestamp("joined_at", &self.joined_at)?,
        })
    }
}

pub(crate) fn parse_role(s: &str) -> Result<ParticipantRole> {
    match s {
        "owner" => Ok(ParticipantRole::Owner),
        "member" => Ok(ParticipantRole::Member),
        other => Err(AppError::Db(format!("invalid participant role: {other}"))),
    }
}

pub(crate) fn role_str(r: ParticipantRole) -> &'static str {
    r.as_str()
}

impl ParticipantRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Add a member, leaving an existing row (and its role) untouched.
    ///
    /// Returns whether a new row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn upsert_member(&self, session_id: &str, user_id: &str) -> Result<bool> {
        let member = Participant::new(
            session_id.to_owned(),
            user_id.to_owned(),
            ParticipantRole::Member,
        );

        let result = sqlx::query(
            "INSERT INTO participant (session_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, user_id) DO NOTHING",
        )
        .bind(&member.session_id)
        .bind(&member.user_id)
        .bind(role_str(member.role))
        .bind(format_timestamp(&member.joined_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a single membership row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, session_id: &str, user_id: &str) -> Result<Option<Participant>> {
        let row: Option<ParticipantRow> = sqlx::query_as(
            "SELECT session_id, user_id, role, joined_at FROM participant
             WHERE session_id = ?1 AND user_id = ?2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(ParticipantRow::into_participant).transpose()
    }

    /// Remove a membership row. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove(&self, session_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM participant WHERE session_id = ?1 AND user_id = ?2")
            .bind(session_id)
            .bind(user_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Members of a session with user projections, earliest joiner first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_views(&self, session_id: &str) -> Result<Vec<ParticipantView>> {
        let rows: Vec<ParticipantViewRow> = sqlx::query_as(
            "SELECT p.user_id, p.role, p.joined_at,
                    u.name AS user_name, u.artist_name AS user_artist_name
             FROM participant p
             LEFT JOIN user_account u ON u.id = p.user_id
             WHERE p.session_id = ?1
             ORDER BY p.joined_at ASC",
        )
        .bind(session_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ParticipantViewRow::into_view).collect()
    }

    /// Number of membership rows for a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_for_session(&self, session_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM participant WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(self.db.as_ref())
                .await?;
        Ok(count)
    }
}
