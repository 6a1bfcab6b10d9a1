//! Persistence layer modules.

pub mod channel_repo;
pub mod db;
pub mod invite_repo;
pub mod participant_repo;
pub mod revision_repo;
pub mod schema;
pub mod session_repo;
pub mod user_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
