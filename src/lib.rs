#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use orchestrator::SessionManager;
