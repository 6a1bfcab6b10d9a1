//! Invite repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::invite::{Invite, InviteStatus};
use crate::models::participant::{Participant, ParticipantRole};
use crate::models::snapshot::InviteSummary;
use crate::models::user::UserSummary;
use crate::models::{format_timestamp, now_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::{AppError, Result};

use super::db::Database;
use super::participant_repo::role_str;

/// Repository wrapper around `SQLite` for invite records.
#[derive(Clone)]
pub struct InviteRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct InviteRow {
    id: String,
    session_id: String,
    inviter_id: String,
    invitee_id: String,
    status: String,
    created_at: String,
    responded_at: Option<String>,
}

impl InviteRow {
    fn into_invite(self) -> Result<Invite> {
        Ok(Invite {
            id: self.id,
            session_id: self.session_id,
            inviter_id: self.inviter_id,
            invitee_id: self.invitee_id,
            status: parse_invite_status(&self.status)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            responded_at: parse_optional_timestamp("responded_at", self.responded_at.as_deref())?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InviteSummaryRow {
    id: String,
    status: String,
    session_id: String,
    session_slug: String,
    session_title: String,
    inviter_id: String,
    inviter_name: Option<String>,
    inviter_artist_name: Option<String>,
    created_at: String,
}

impl InviteSummaryRow {
    fn into_summary(self) -> Result<InviteSummary> {
        Ok(InviteSummary {
            id: self.id,
            status: parse_invite_status(&self.status)?,
            session_id: self.session_id,
            session_slug: self.session_slug,
            session_title: self.session_title,
            inviter: UserSummary {
                id: self.inviter_id,
                name: self.inviter_name,
                artist_name: self.inviter_artist_name,
            },
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

fn parse_invite_status(s: &str) -> Result<InviteStatus> {
    match s {
        "pending" => Ok(InviteStatus::Pending),
        "accepted" => Ok(InviteStatus::Accepted),
        "declined" => Ok(InviteStatus::Declined),
        other => Err(AppError::Db(format!("invalid invite status: {other}"))),
    }
}

impl InviteRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a pending invite, or reset the existing `(session, invitee)`
    /// invite back to pending with a new inviter and no response time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert_pending(
        &self,
        session_id: &str,
        inviter_id: &str,
        invitee_id: &str,
    ) -> Result<Invite> {
        let fresh = Invite::new(
            session_id.to_owned(),
            inviter_id.to_owned(),
            invitee_id.to_owned(),
        );

        sqlx::query(
            "INSERT INTO invite (id, session_id, inviter_id, invitee_id, status, created_at,
             responded_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, NULL)
             ON CONFLICT(session_id, invitee_id) DO UPDATE SET
                inviter_id = excluded.inviter_id,
                status = 'pending',
                responded_at = NULL",
        )
        .bind(&fresh.id)
        .bind(&fresh.session_id)
        .bind(&fresh.inviter_id)
        .bind(&fresh.invitee_id)
        .bind(format_timestamp(&fresh.created_at))
        .execute(self.db.as_ref())
        .await?;

        self.get_for_invitee(session_id, invitee_id)
            .await?
            .ok_or_else(|| AppError::Db("failed to upsert invite".into()))
    }

    /// Retrieve an invite by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Invite>> {
        let row: Option<InviteRow> = sqlx::query_as("SELECT * FROM invite WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(InviteRow::into_invite).transpose()
    }

    /// Retrieve the invite for one invitee in one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_for_invitee(
        &self,
        session_id: &str,
        invitee_id: &str,
    ) -> Result<Option<Invite>> {
        let row: Option<InviteRow> =
            sqlx::query_as("SELECT * FROM invite WHERE session_id = ?1 AND invitee_id = ?2")
                .bind(session_id)
                .bind(invitee_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(InviteRow::into_invite).transpose()
    }

    /// Move a pending invite to a terminal status.
    ///
    /// The update only matches rows still `pending`, so a concurrent second
    /// response cannot overwrite the first. Returns whether a row changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn resolve_pending(&self, id: &str, status: InviteStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE invite SET status = ?1, responded_at = ?2
             WHERE id = ?3 AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(id)
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Accept a pending invite and add the invitee as a member in one
    /// transaction.
    ///
    /// Returns `false` when the invite is no longer pending. An existing
    /// membership row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the session is closed, in which case
    /// the invite stays pending, and `AppError::Db` if a statement fails.
    pub async fn accept_and_join(&self, id: &str) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let pending: Option<(String, String, String)> = sqlx::query_as(
            "SELECT i.session_id, i.invitee_id, s.status
             FROM invite i
             JOIN jam_session s ON s.id = i.session_id
             WHERE i.id = ?1 AND i.status = 'pending'",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((session_id, invitee_id, session_status)) = pending else {
            tx.rollback().await?;
            return Ok(false);
        };
        if session_status != "active" {
            tx.rollback().await?;
            return Err(AppError::Validation(format!("session {session_id} is closed")));
        }

        let accepted = sqlx::query(
            "UPDATE invite SET status = 'accepted', responded_at = ?1
             WHERE id = ?2 AND status = 'pending'",
        )
        .bind(now_timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if accepted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let member = Participant::new(session_id, invitee_id, ParticipantRole::Member);
        sqlx::query(
            "INSERT INTO participant (session_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, user_id) DO NOTHING",
        )
        .bind(&member.session_id)
        .bind(&member.user_id)
        .bind(role_str(member.role))
        .bind(format_timestamp(&member.joined_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Pending invites addressed to a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_pending_for_invitee(&self, invitee_id: &str) -> Result<Vec<InviteSummary>> {
        let rows: Vec<InviteSummaryRow> = sqlx::query_as(
            "SELECT i.id, i.status, i.session_id, s.slug AS session_slug,
                    s.title AS session_title, i.inviter_id,
                    u.name AS inviter_name, u.artist_name AS inviter_artist_name,
                    i.created_at
             FROM invite i
             JOIN jam_session s ON s.id = i.session_id
             LEFT JOIN user_account u ON u.id = i.inviter_id
             WHERE i.invitee_id = ?1 AND i.status = 'pending'
             ORDER BY i.created_at DESC",
        )
        .bind(invitee_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(InviteSummaryRow::into_summary).collect()
    }

    /// Number of invites for a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_for_session(&self, session_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invite WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
