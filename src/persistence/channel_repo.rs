//! Channel repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::channel::{Channel, ChannelStatus};
use crate::models::snapshot::ChannelView;
use crate::models::user::UserSummary;
use crate::models::{
    format_timestamp, now_timestamp, parse_optional_timestamp, parse_timestamp,
};
use crate::{AppError, Result};

use super::db::Database;
use super::revision_repo;

/// Repository wrapper around `SQLite` for channel records.
#[derive(Clone)]
pub struct ChannelRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: String,
    session_id: String,
    user_id: String,
    element_id: Option<String>,
    name: Option<String>,
    status: String,
    code: String,
    volume: f64,
    pan: f64,
    metadata: String,
    last_evaluated_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChannelRow {
    /// Convert a database row into the domain model.
    fn into_channel(self) -> Result<Channel> {
        Ok(Channel {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            element_id: self.element_id,
            name: self.name,
            status: parse_channel_status(&self.status)?,
            code: self.code,
            volume: self.volume,
            pan: self.pan,
            metadata: serde_json::from_str(&self.metadata)?,
            last_evaluated_at: parse_optional_timestamp(
                "last_evaluated_at",
                self.last_evaluated_at.as_deref(),
            )?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

/// Channel joined with its author's projection.
#[derive(sqlx::FromRow)]
struct ChannelViewRow {
    #[sqlx(flatten)]
    channel: ChannelRow,
    author_name: Option<String>,
    author_artist_name: Option<String>,
}

impl ChannelViewRow {
    fn into_view(self) -> Result<ChannelView> {
        let author = UserSummary {
            id: self.channel.user_id.clone(),
            name: self.author_name,
            artist_name: self.author_artist_name,
        };
        Ok(ChannelView::new(self.channel.into_channel()?, author))
    }
}

pub(crate) fn parse_channel_status(s: &str) -> Result<ChannelStatus> {
    match s {
        "draft" => Ok(ChannelStatus::Draft),
        "live" => Ok(ChannelStatus::Live),
        "published" => Ok(ChannelStatus::Published),
        other => Err(AppError::Db(format!("invalid channel status: {other}"))),
    }
}

impl ChannelRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Retrieve a channel by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as("SELECT * FROM channel WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(ChannelRow::into_channel).transpose()
    }

    /// Find an author's channel for an external element inside a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_by_element(
        &self,
        session_id: &str,
        user_id: &str,
        element_id: &str,
    ) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(
            "SELECT * FROM channel
             WHERE session_id = ?1 AND user_id = ?2 AND element_id = ?3
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(element_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(ChannelRow::into_channel).transpose()
    }

    /// Insert or update a channel and append its revision in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the code is empty, `AppError::Db`
    /// if either write fails (nothing is kept in that case).
    pub async fn save_with_revision(&self, channel: &Channel, is_new: bool) -> Result<()> {
        if channel.code.trim().is_empty() {
            return Err(AppError::Validation("channel code must not be empty".into()));
        }

        let metadata = serde_json::to_string(&channel.metadata)?;
        let mut tx = self.db.begin().await?;

        if is_new {
            sqlx::query(
                "INSERT INTO channel (id, session_id, user_id, element_id, name, status, code,
                 volume, pan, metadata, last_evaluated_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )
            .bind(&channel.id)
            .bind(&channel.session_id)
            .bind(&channel.user_id)
            .bind(&channel.element_id)
            .bind(&channel.name)
            .bind(channel.status.as_str())
            .bind(&channel.code)
            .bind(channel.volume)
            .bind(channel.pan)
            .bind(&metadata)
            .bind(channel.last_evaluated_at.as_ref().map(format_timestamp))
            .bind(format_timestamp(&channel.created_at))
            .bind(format_timestamp(&channel.updated_at))
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE channel SET element_id = ?1, name = ?2, status = ?3, code = ?4,
                 volume = ?5, pan = ?6, metadata = ?7, updated_at = ?8
                 WHERE id = ?9",
            )
            .bind(&channel.element_id)
            .bind(&channel.name)
            .bind(channel.status.as_str())
            .bind(&channel.code)
            .bind(channel.volume)
            .bind(channel.pan)
            .bind(&metadata)
            .bind(format_timestamp(&channel.updated_at))
            .bind(&channel.id)
            .execute(&mut *tx)
            .await?;
        }

        revision_repo::append(&mut *tx, channel).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Channels of a session with author projections, ordered by status
    /// then recency, both descending.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_views(&self, session_id: &str) -> Result<Vec<ChannelView>> {
        let rows: Vec<ChannelViewRow> = sqlx::query_as(
            "SELECT c.*, u.name AS author_name, u.artist_name AS author_artist_name
             FROM channel c
             LEFT JOIN user_account u ON u.id = c.user_id
             WHERE c.session_id = ?1
             ORDER BY c.status DESC, c.updated_at DESC",
        )
        .bind(session_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ChannelViewRow::into_view).collect()
    }

    /// Stamp `last_evaluated_at` on the given channels.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if an update fails.
    pub async fn mark_evaluated(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = now_timestamp();
        let mut tx = self.db.begin().await?;
        for id in ids {
            sqlx::query("UPDATE channel SET last_evaluated_at = ?1 WHERE id = ?2")
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Number of channels in a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_for_session(&self, session_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channel WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
