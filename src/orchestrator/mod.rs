//! Session lifecycle orchestration: debounced recomputation, invites,
//! resource sampling and the event bus, behind one facade.

pub mod events;
pub mod invite_workflow;
pub mod refresh_scheduler;
pub mod resource_sampler;
pub mod session_manager;

pub use events::{EventBus, SessionEvent};
pub use session_manager::SessionManager;
