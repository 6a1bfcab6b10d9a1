//! Local mirror of identity-provider accounts.

use std::sync::Arc;

use crate::models::now_timestamp;
use crate::models::user::UserSummary;
use crate::Result;

use super::db::Database;

/// Repository for `user_account` rows.
#[derive(Clone)]
pub struct UserRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    artist_name: Option<String>,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            artist_name: row.artist_name,
        }
    }
}

impl UserRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or refresh an account projection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert(&self, user: &UserSummary) -> Result<UserSummary> {
        let now = now_timestamp();
        sqlx::query(
            "INSERT INTO user_account (id, name, artist_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                artist_name = excluded.artist_name,
                updated_at = excluded.updated_at",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.artist_name)
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;

        Ok(user.clone())
    }

    /// Fetch an account projection; unknown ids project as anonymous.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn summary(&self, id: &str) -> Result<UserSummary> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, artist_name FROM user_account WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        Ok(row.map_or_else(|| UserSummary::unknown(id), UserSummary::from))
    }
}
