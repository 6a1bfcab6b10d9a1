//! Backing stores for the snapshot cache.
//!
//! [`SnapshotStore`] hides where snapshots and slug mappings live. The
//! in-process [`MemorySnapshotStore`] suits a single server; a shared store
//! honouring the same contract is needed once several processes serve the
//! same sessions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::models::snapshot::SessionSnapshot;

/// A snapshot together with the instant it was loaded.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    /// The cached view.
    pub snapshot: Arc<SessionSnapshot>,
    /// Load time used for TTL checks.
    pub fetched_at: Instant,
}

impl CachedSnapshot {
    /// Wrap a freshly loaded snapshot.
    #[must_use]
    pub fn fresh(snapshot: Arc<SessionSnapshot>) -> Self {
        Self {
            snapshot,
            fetched_at: Instant::now(),
        }
    }
}

/// Boxed future returned by every [`SnapshotStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage seam for snapshots (keyed by session id) and slug mappings.
pub trait SnapshotStore: Send + Sync {
    /// Cached entry for a session, regardless of age.
    fn get(&self, session_id: &str) -> StoreFuture<'_, Option<CachedSnapshot>>;

    /// Store or replace the entry for `entry.snapshot.id`.
    fn put(&self, entry: CachedSnapshot) -> StoreFuture<'_, ()>;

    /// Drop the entry for a session, if any.
    fn invalidate(&self, session_id: &str) -> StoreFuture<'_, ()>;

    /// Canonical id previously recorded for a slug.
    fn lookup_slug(&self, slug: &str) -> StoreFuture<'_, Option<String>>;

    /// Record a slug mapping. Slugs never change, so mappings never expire.
    fn remember_slug(&self, slug: &str, session_id: &str) -> StoreFuture<'_, ()>;

    /// Forget a slug mapping after its session is deleted.
    fn forget_slug(&self, slug: &str) -> StoreFuture<'_, ()>;
}

/// Per-process store backed by two maps.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, CachedSnapshot>>,
    slugs: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    /// Create an empty store behind the trait object used by the cache.
    #[must_use]
    pub fn new_shared() -> Arc<dyn SnapshotStore> {
        Arc::new(Self::default())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, session_id: &str) -> StoreFuture<'_, Option<CachedSnapshot>> {
        let session_id = session_id.to_owned();
        Box::pin(async move { self.snapshots.lock().await.get(&session_id).cloned() })
    }

    fn put(&self, entry: CachedSnapshot) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let key = entry.snapshot.id.clone();
            self.snapshots.lock().await.insert(key, entry);
        })
    }

    fn invalidate(&self, session_id: &str) -> StoreFuture<'_, ()> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            self.snapshots.lock().await.remove(&session_id);
        })
    }

    fn lookup_slug(&self, slug: &str) -> StoreFuture<'_, Option<String>> {
        let slug = slug.to_owned();
        Box::pin(async move { self.slugs.lock().await.get(&slug).cloned() })
    }

    fn remember_slug(&self, slug: &str, session_id: &str) -> StoreFuture<'_, ()> {
        let slug = slug.to_owned();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            self.slugs.lock().await.insert(slug, session_id);
        })
    }

    fn forget_slug(&self, slug: &str) -> StoreFuture<'_, ()> {
        let slug = slug.to_owned();
        Box::pin(async move {
            self.slugs.lock().await.remove(&slug);
        })
    }
}
