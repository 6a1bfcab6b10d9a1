//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every startup. Every session-scoped table cascades from
//! `jam_session` so deleting a session removes all of its rows.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS user_account (
    id              TEXT PRIMARY KEY NOT NULL,
    name            TEXT,
    artist_name     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jam_session (
    id              TEXT PRIMARY KEY NOT NULL,
    slug            TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('active','closed')),
    owner_id        TEXT NOT NULL,
    master_code     TEXT NOT NULL DEFAULT '',
    merged_stack    TEXT NOT NULL DEFAULT '',
    apply_delay_ms  INTEGER NOT NULL DEFAULT 0 CHECK(apply_delay_ms BETWEEN 0 AND 5000),
    cpu_stats       TEXT NOT NULL DEFAULT '{}',
    settings        TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participant (
    session_id      TEXT NOT NULL REFERENCES jam_session(id) ON DELETE CASCADE,
    user_id         TEXT NOT NULL,
    role            TEXT NOT NULL CHECK(role IN ('owner','member')),
    joined_at       TEXT NOT NULL,
    PRIMARY KEY (session_id, user_id)
);

CREATE TABLE IF NOT EXISTS channel (
    id              TEXT PRIMARY KEY NOT NULL,
    session_id      TEXT NOT NULL REFERENCES jam_session(id) ON DELETE CASCADE,
    user_id         TEXT NOT NULL,
    element_id      TEXT,
    name            TEXT,
    status          TEXT NOT NULL DEFAULT 'draft' CHECK(status IN ('draft','live','published')),
    code            TEXT NOT NULL CHECK(length(trim(code)) > 0),
    volume          REAL NOT NULL DEFAULT 1.0,
    pan             REAL NOT NULL DEFAULT 0.0,
    metadata        TEXT NOT NULL DEFAULT '{}',
    last_evaluated_at TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS channel_revision (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id      TEXT NOT NULL REFERENCES channel(id) ON DELETE CASCADE,
    session_id      TEXT NOT NULL REFERENCES jam_session(id) ON DELETE CASCADE,
    user_id         TEXT NOT NULL,
    code            TEXT NOT NULL,
    applied_to_master INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invite (
    id              TEXT PRIMARY KEY NOT NULL,
    session_id      TEXT NOT NULL REFERENCES jam_session(id) ON DELETE CASCADE,
    inviter_id      TEXT NOT NULL,
    invitee_id      TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('pending','accepted','declined')),
    created_at      TEXT NOT NULL,
    responded_at    TEXT,
    UNIQUE (session_id, invitee_id)
);

CREATE INDEX IF NOT EXISTS idx_participant_user ON participant(user_id);
CREATE INDEX IF NOT EXISTS idx_channel_session ON channel(session_id);
CREATE INDEX IF NOT EXISTS idx_channel_author ON channel(session_id, user_id, element_id);
CREATE INDEX IF NOT EXISTS idx_revision_channel ON channel_revision(channel_id);
CREATE INDEX IF NOT EXISTS idx_revision_session ON channel_revision(session_id);
CREATE INDEX IF NOT EXISTS idx_invite_invitee ON invite(invitee_id, status);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
