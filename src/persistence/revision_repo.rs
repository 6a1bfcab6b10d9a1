//! Append-only channel revision log.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::models::channel::Channel;
use crate::models::revision::ChannelRevision;
use crate::models::{now_timestamp, parse_timestamp};
use crate::Result;

use super::db::Database;

/// Repository for `channel_revision` rows. Rows are never updated.
#[derive(Clone)]
pub struct RevisionRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct RevisionRow {
    id: i64,
    channel_id: String,
    session_id: String,
    user_id: String,
    code: String,
    applied_to_master: i64,
    created_at: String,
}

impl RevisionRow {
    fn into_revision(self) -> Result<ChannelRevision> {
        Ok(ChannelRevision {
            id: self.id,
            channel_id: self.channel_id,
            session_id: self.session_id,
            user_id: self.user_id,
            code: self.code,
            applied_to_master: self.applied_to_master != 0,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

/// Append a revision for `channel` on an open connection or transaction.
pub(crate) async fn append(conn: &mut SqliteConnection, channel: &Channel) -> Result<()> {
    sqlx::query(
        "INSERT INTO channel_revision (channel_id, session_id, user_id, code,
         applied_to_master, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&channel.id)
    .bind(&channel.session_id)
    .bind(&channel.user_id)
    .bind(&channel.code)
    .bind(i64::from(channel.status.is_live()))
    .bind(now_timestamp())
    .execute(conn)
    .await?;
    Ok(())
}

impl RevisionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Revisions of one channel, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_channel(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<ChannelRevision>> {
        let rows: Vec<RevisionRow> = sqlx::query_as(
            "SELECT * FROM channel_revision WHERE channel_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )
        .bind(channel_id)
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(RevisionRow::into_revision).collect()
    }

    /// Number of revisions recorded for a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_for_session(&self, session_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM channel_revision WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(self.db.as_ref())
                .await?;
        Ok(count)
    }
}
