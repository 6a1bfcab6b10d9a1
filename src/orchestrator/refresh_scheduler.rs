//! Debounced per-session refresh scheduling.
//!
//! Channel edits arrive in bursts. Instead of recomputing the master on
//! every write, [`RefreshScheduler::schedule`] arms at most one timer per
//! session; further requests while it is armed are coalesced into it. The
//! timer clears its own marker before running the job, so writes that land
//! during the job arm a fresh cycle instead of being lost.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info_span, Instrument};

use crate::Result;

struct PendingRefresh {
    ticket: u64,
    cancel: CancellationToken,
}

/// Per-process registry of armed refresh timers.
#[derive(Default)]
pub struct RefreshScheduler {
    pending: Mutex<HashMap<String, PendingRefresh>>,
    tracker: TaskTracker,
    next_ticket: AtomicU64,
}

impl RefreshScheduler {
    /// Create a scheduler with no armed timers.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Arm a refresh for `session_id` that runs `job` after `wait`.
    ///
    /// Returns `false` without calling `job` when a refresh is already
    /// armed for the session. Job failures are logged, never propagated.
    pub async fn schedule<F, Fut>(
        self: &Arc<Self>,
        session_id: &str,
        wait: Duration,
        job: F,
    ) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        {
            let mut pending = self.pending.lock().await;
            if pending.contains_key(session_id) {
                debug!(session_id, "refresh already pending, coalescing");
                return false;
            }
            pending.insert(
                session_id.to_owned(),
                PendingRefresh {
                    ticket,
                    cancel: cancel.clone(),
                },
            );
        }

        let this = Arc::clone(self);
        let owned_id = session_id.to_owned();
        let work = job();
        let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        debug!(session_id, wait_ms, "refresh scheduled");

        self.tracker.spawn(
            async move {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!(session_id = %owned_id, "scheduled refresh cancelled");
                        return;
                    }
                    () = tokio::time::sleep(wait) => {}
                }

                this.release(&owned_id, ticket).await;

                if let Err(err) = work.await {
                    error!(session_id = %owned_id, %err, "scheduled refresh failed");
                }
            }
            .instrument(info_span!("scheduled_refresh", session_id)),
        );

        true
    }

    /// Disarm a pending refresh. Returns whether one was armed.
    pub async fn cancel(&self, session_id: &str) -> bool {
        let removed = self.pending.lock().await.remove(session_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(session_id, "pending refresh cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a refresh is armed for the session.
    pub async fn is_pending(&self, session_id: &str) -> bool {
        self.pending.lock().await.contains_key(session_id)
    }

    /// Number of sessions with an armed refresh.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Wait until every armed refresh (and any it re-arms) has finished.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Disarm everything and wait for in-flight jobs to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<PendingRefresh> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            entry.cancel.cancel();
        }
        self.flush().await;
    }

    /// Clear the marker, unless a newer schedule already replaced it.
    async fn release(&self, session_id: &str, ticket: u64) {
        let mut pending = self.pending.lock().await;
        if pending.get(session_id).is_some_and(|entry| entry.ticket == ticket) {
            pending.remove(session_id);
        }
    }
}
