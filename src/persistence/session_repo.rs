//! Session repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::participant::{Participant, ParticipantRole};
use crate::models::session::{Session, SessionStatus};
use crate::models::snapshot::{MasterUpdate, SessionSummary};
use crate::models::stats::CpuStats;
use crate::models::{format_timestamp, now_timestamp, parse_timestamp};
use crate::{AppError, Result};

use super::db::Database;
use super::participant_repo::{parse_role, role_str};

/// Repository wrapper around `SQLite` for session records.
#[derive(Clone)]
pub struct SessionRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    slug: String,
    title: String,
    status: String,
    owner_id: String,
    master_code: String,
    merged_stack: String,
    apply_delay_ms: i64,
    cpu_stats: String,
    settings: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: self.id,
            slug: self.slug,
            title: self.title,
            status: parse_status(&self.status)?,
            owner_id: self.owner_id,
            master_code: self.master_code,
            merged_stack: self.merged_stack,
            apply_delay_ms: self.apply_delay_ms,
            cpu_stats: serde_json::from_str::<CpuStats>(&self.cpu_stats)?,
            settings: serde_json::from_str(&self.settings)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    slug: String,
    title: String,
    status: String,
    owner_id: String,
    role: String,
    participant_count: i64,
    channel_count: i64,
    updated_at: String,
}

impl SummaryRow {
    fn into_summary(self) -> Result<SessionSummary> {
        Ok(SessionSummary {
            id: self.id,
            slug: self.slug,
            title: self.title,
            status: parse_status(&self.status)?,
            owner_id: self.owner_id,
            role: parse_role(&self.role)?,
            participant_count: self.participant_count,
            channel_count: self.channel_count,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

pub(crate) fn parse_status(s: &str) -> Result<SessionStatus> {
    match s {
        "active" => Ok(SessionStatus::Active),
        "closed" => Ok(SessionStatus::Closed),
        other => Err(AppError::Db(format!("invalid session status: {other}"))),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a session together with its owner participant row.
    ///
    /// Both rows are written in one transaction. Returns `Ok(false)` when
    /// the slug is already taken so the caller can retry with a new one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails for any other reason.
    pub async fn try_create_with_owner(&self, session: &Session) -> Result<bool> {
        let owner = Participant::new(
            session.id.clone(),
            session.owner_id.clone(),
            ParticipantRole::Owner,
        );
        let cpu_stats = serde_json::to_string(&session.cpu_stats)?;
        let settings = serde_json::to_string(&session.settings)?;

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO jam_session (id, slug, title, status, owner_id, master_code,
             merged_stack, apply_delay_ms, cpu_stats, settings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&session.id)
        .bind(&session.slug)
        .bind(&session.title)
        .bind(session.status.as_str())
        .bind(&session.owner_id)
        .bind(&session.master_code)
        .bind(&session.merged_stack)
        .bind(session.apply_delay_ms)
        .bind(&cpu_stats)
        .bind(&settings)
        .bind(format_timestamp(&session.created_at))
        .bind(format_timestamp(&session.updated_at))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }

        sqlx::query(
            "INSERT INTO participant (session_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&owner.session_id)
        .bind(&owner.user_id)
        .bind(role_str(owner.role))
        .bind(format_timestamp(&owner.joined_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Retrieve a session by identifier.
    ///
    /// Returns `Ok(None)` if the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM jam_session WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Look up the canonical id for a slug.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_id_by_slug(&self, slug: &str) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM jam_session WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(self.db.as_ref())
            .await?;
        Ok(id)
    }

    /// Whether a session with this id exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM jam_session WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        Ok(found.is_some())
    }

    /// Store merge output, optionally with an updated sample history.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session vanished, `AppError::Db`
    /// if the update fails.
    pub async fn update_master(
        &self,
        id: &str,
        master: &MasterUpdate,
        cpu_stats: Option<&CpuStats>,
    ) -> Result<()> {
        let now = now_timestamp();
        let result = if let Some(stats) = cpu_stats {
            let stats = serde_json::to_string(stats)?;
            sqlx::query(
                "UPDATE jam_session SET master_code = ?1, merged_stack = ?2, cpu_stats = ?3,
                 updated_at = ?4 WHERE id = ?5",
            )
            .bind(&master.master_code)
            .bind(&master.merged_stack)
            .bind(&stats)
            .bind(&now)
            .bind(id)
            .execute(self.db.as_ref())
            .await?
        } else {
            sqlx::query(
                "UPDATE jam_session SET master_code = ?1, merged_stack = ?2, updated_at = ?3
                 WHERE id = ?4",
            )
            .bind(&master.master_code)
            .bind(&master.merged_stack)
            .bind(&now)
            .bind(id)
            .execute(self.db.as_ref())
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("session {id} not found")));
        }
        Ok(())
    }

    /// Store an already clamped apply delay.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub async fn update_apply_delay(&self, id: &str, apply_delay_ms: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jam_session SET apply_delay_ms = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(apply_delay_ms)
        .bind(now_timestamp())
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("session {id} not found")));
        }
        Ok(())
    }

    /// Update the lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub async fn update_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        let result =
            sqlx::query("UPDATE jam_session SET status = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(status.as_str())
                .bind(now_timestamp())
                .bind(id)
                .execute(self.db.as_ref())
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("session {id} not found")));
        }
        Ok(())
    }

    /// Bump `updated_at` so the session sorts as recently active.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn touch(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE jam_session SET updated_at = ?1 WHERE id = ?2")
            .bind(now_timestamp())
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Delete a session; participants, channels, revisions and invites cascade.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jam_session WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sessions the user participates in, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SessionSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT s.id, s.slug, s.title, s.status, s.owner_id, p.role, s.updated_at,
                    (SELECT COUNT(*) FROM participant WHERE session_id = s.id) AS participant_count,
                    (SELECT COUNT(*) FROM channel WHERE session_id = s.id) AS channel_count
             FROM jam_session s
             JOIN participant p ON p.session_id = s.id AND p.user_id = ?1
             ORDER BY s.updated_at DESC
             LIMIT ?2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SummaryRow::into_summary).collect()
    }
}
