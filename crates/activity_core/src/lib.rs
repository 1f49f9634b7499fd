//! Core logic for the activity list.
//! This crate is the single source of truth for record invariants, the
//! live-collection adapter and the screen's view state.

pub mod backend;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod projector;
pub mod store;

pub use backend::{backend, init_backend, BackendClient, BackendError};
pub use config::{BackendConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::activity::{validate_name, ActivityId, ActivityRecord, ValidationError};
pub use projector::{ActivityProjector, ViewPhase, ViewState};
pub use store::{
    ActivityStore, MemoryActivityStore, PersistenceError, PersistenceResult, SnapshotResult,
    SqliteActivityStore, Subscription,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
