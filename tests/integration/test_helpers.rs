//! Shared construction of an in-memory `SessionManager` and common fixtures.

use std::sync::Arc;

use pattern_jam::cache::SnapshotStore;
use pattern_jam::config::GlobalConfig;
use pattern_jam::models::channel::{ChannelPayload, ChannelStatus};
use pattern_jam::models::snapshot::SessionSnapshot;
use pattern_jam::models::user::UserSummary;
use pattern_jam::persistence::db::{self, Database};
use pattern_jam::SessionManager;

/// Config with a short debounce so tests settle quickly.
pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
database_path = ":memory:"

[refresh]
base_delay_ms = 20
max_apply_delay_ms = 5000
"#,
    )
    .expect("valid test config")
}

/// Manager plus a handle on its database for direct row assertions.
pub async fn manager() -> (SessionManager, Arc<Database>) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let manager = SessionManager::new(Arc::new(test_config()), Arc::clone(&db));
    (manager, db)
}

/// Manager over a caller-provided snapshot store.
pub async fn manager_with_store(store: Arc<dyn SnapshotStore>) -> (SessionManager, Arc<Database>) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let manager = SessionManager::with_store(Arc::new(test_config()), Arc::clone(&db), store);
    (manager, db)
}

/// Register a user with an artist name.
pub async fn register(manager: &SessionManager, id: &str, artist: &str) {
    manager
        .register_user(UserSummary {
            id: id.into(),
            name: Some(id.into()),
            artist_name: Some(artist.into()),
        })
        .await
        .expect("register user");
}

/// Session owned by `owner` with `members` already joined.
pub async fn session_with(
    manager: &SessionManager,
    owner: &str,
    members: &[&str],
) -> Arc<SessionSnapshot> {
    let snapshot = manager
        .create_session(owner, "Friday Jam")
        .await
        .expect("create session");
    for member in members {
        manager
            .join_session(&snapshot.id, member)
            .await
            .expect("join session");
    }
    manager
        .get_session_snapshot(&snapshot.id, true)
        .await
        .expect("snapshot")
}

/// Named live channel payload.
pub fn live(name: &str, code: &str) -> ChannelPayload {
    ChannelPayload {
        name: Some(name.into()),
        status: Some(ChannelStatus::Live),
        ..ChannelPayload::with_code(code)
    }
}

/// Count rows in `table` belonging to `session_id`.
pub async fn count_rows(db: &Database, table: &str, session_id: &str) -> i64 {
    let column = if table == "jam_session" { "id" } else { "session_id" };
    let query = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1");
    sqlx::query_scalar(&query)
        .bind(session_id)
        .fetch_one(db)
        .await
        .expect("count rows")
}
