//! Persistence adapter over a document collection.
//!
//! # Responsibility
//! - Translate the four activity mutations into store writes.
//! - Expose collection contents as a push-based subscription of full
//!   snapshots.
//!
//! # Invariants
//! - Writes validate names before touching the store.
//! - Only field-scoped updates are issued (`name` or `completed`).
//! - Failures are returned once; there are no retries or queues.

use crate::db::DbError;
use crate::model::activity::{ActivityId, ActivityRecord, ValidationError};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;
pub mod subscription;

pub use memory::MemoryActivityStore;
pub use sqlite::SqliteActivityStore;
pub use subscription::{SnapshotResult, Subscription};

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Failure reported by the backing store.
#[derive(Debug)]
pub enum PersistenceError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(ActivityId),
    InvalidData(String),
    Unavailable(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "activity not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid stored activity data: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<ValidationError> for PersistenceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for PersistenceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Adapter contract for the activity collection.
///
/// Implementations must be shareable across tasks: the projector holds one
/// behind an `Arc` and calls it from spawned mutation tasks.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Opens a fresh live listener ordered by `created_at` descending.
    fn subscribe(&self) -> Subscription;

    /// Persists a new record and returns the store-assigned id.
    ///
    /// Any id already present on `record` is ignored.
    async fn create(&self, record: &ActivityRecord) -> PersistenceResult<ActivityId>;

    /// Updates only the `completed` field.
    async fn set_completed(&self, id: &str, value: bool) -> PersistenceResult<()>;

    /// Updates only the `name` field. Blank names are a successful no-op.
    async fn rename(&self, id: &str, new_name: &str) -> PersistenceResult<()>;

    /// Removes the record. Unknown ids are treated as success.
    async fn delete(&self, id: &str) -> PersistenceResult<()>;
}
