//! Read-through snapshot cache and identifier resolution.
//!
//! Snapshots are cached per session for a fixed TTL. Writers never update
//! the cache directly; they call [`SnapshotCache::load`] (or
//! `get(.., true)`) after their write lands.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::models::snapshot::SessionSnapshot;
use crate::persistence::channel_repo::ChannelRepo;
use crate::persistence::db::Database;
use crate::persistence::participant_repo::ParticipantRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::persistence::user_repo::UserRepo;
use crate::Result;

pub use store::{CachedSnapshot, MemorySnapshotStore, SnapshotStore, StoreFuture};

/// TTL-bounded cache of fully joined session snapshots.
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
    ttl: Duration,
    sessions: SessionRepo,
    participants: ParticipantRepo,
    channels: ChannelRepo,
    users: UserRepo,
}

impl SnapshotCache {
    /// Build a cache over `db` using the given backing store.
    #[must_use]
    pub fn new(db: Arc<Database>, store: Arc<dyn SnapshotStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            sessions: SessionRepo::new(Arc::clone(&db)),
            participants: ParticipantRepo::new(Arc::clone(&db)),
            channels: ChannelRepo::new(Arc::clone(&db)),
            users: UserRepo::new(db),
        }
    }

    /// Resolve a canonical id or a slug to the canonical session id.
    ///
    /// Slug lookups are memoized indefinitely.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a lookup query fails.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<String>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(None);
        }

        if let Some(id) = self.store.lookup_slug(identifier).await {
            return Ok(Some(id));
        }

        if self.sessions.exists(identifier).await? {
            return Ok(Some(identifier.to_owned()));
        }

        let Some(id) = self.sessions.find_id_by_slug(identifier).await? else {
            return Ok(None);
        };
        self.store.remember_slug(identifier, &id).await;
        if !self.sessions.exists(&id).await? {
            self.store.forget_slug(identifier).await;
            return Ok(None);
        }
        debug!(slug = identifier, session_id = %id, "slug resolved");
        Ok(Some(id))
    }

    /// Return a snapshot younger than the TTL, loading a fresh one otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if loading fails.
    pub async fn get(
        &self,
        session_id: &str,
        force_refresh: bool,
    ) -> Result<Option<Arc<SessionSnapshot>>> {
        if !force_refresh {
            if let Some(entry) = self.store.get(session_id).await {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(Some(entry.snapshot));
                }
            }
        }
        self.load(session_id).await
    }

    /// Cached snapshot regardless of age, without touching the database.
    pub async fn peek(&self, session_id: &str) -> Option<Arc<SessionSnapshot>> {
        self.store.get(session_id).await.map(|entry| entry.snapshot)
    }

    /// Load, shape and store a fresh snapshot.
    ///
    /// A missing session clears any stale entry and yields `None`. The row is
    /// checked again after the entry is stored, so a delete that lands while
    /// the snapshot is being assembled never leaves it behind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any query fails.
    pub async fn load(&self, session_id: &str) -> Result<Option<Arc<SessionSnapshot>>> {
        let Some(session) = self.sessions.get_by_id(session_id).await? else {
            self.store.invalidate(session_id).await;
            return Ok(None);
        };

        let owner = self.users.summary(&session.owner_id).await?;
        let participants = self.participants.list_views(session_id).await?;
        let channels = self.channels.list_views(session_id).await?;

        let snapshot = Arc::new(SessionSnapshot::assemble(session, owner, participants, channels));
        self.store.remember_slug(&snapshot.slug, &snapshot.id).await;
        self.store.put(CachedSnapshot::fresh(Arc::clone(&snapshot))).await;

        if !self.sessions.exists(session_id).await? {
            debug!(session_id, "session deleted during load; dropping snapshot");
            self.evict(session_id, &snapshot.slug).await;
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Drop every trace of a deleted session, including its slug mapping.
    pub async fn evict(&self, session_id: &str, slug: &str) {
        self.store.invalidate(session_id).await;
        self.store.forget_slug(slug).await;
    }
}
