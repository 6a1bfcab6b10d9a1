//! Session event bus.
//!
//! Transport layers subscribe here to push snapshots and master changes to
//! connected clients. Events fire after the triggering write has landed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::models::snapshot::{MasterUpdate, SessionSnapshot};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Notifications emitted by the session manager.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A snapshot was reloaded, whether or not its content changed.
    SessionUpdated {
        /// Session whose snapshot was refreshed.
        session_id: String,
        /// The fresh snapshot.
        snapshot: Arc<SessionSnapshot>,
    },
    /// The stored master code changed.
    MasterUpdated {
        /// Session whose master changed.
        session_id: String,
        /// New master pair.
        master: MasterUpdate,
    },
}

impl SessionEvent {
    /// Session the event refers to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionUpdated { session_id, .. } | Self::MasterUpdated { session_id, .. } => {
                session_id
            }
        }
    }
}

/// Broadcast fan-out of [`SessionEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is fine.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}
