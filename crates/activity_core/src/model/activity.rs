//! Activity record model.
//!
//! # Responsibility
//! - Define the canonical activity record (name, creation time, completion).
//! - Provide name validation used before every write.
//!
//! # Invariants
//! - `id` is empty until the store assigns one; stable afterwards.
//! - `created_at` is fixed at construction and never rewritten.
//! - `completed` is only changed through field-scoped updates.

use chrono::{Local, TimeZone};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque document identifier assigned by the backing store.
pub type ActivityId = String;

const DISPLAY_DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Validation failures caught before any store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty or whitespace-only.
    BlankName,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "activity name must not be blank"),
        }
    }
}

impl Error for ValidationError {}

/// One entry in the activity list.
///
/// Stored as a document with fields `name`, `date` and `completed`; the `id`
/// lives outside the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub name: String,
    /// Unix epoch milliseconds, stored as `date`.
    pub created_at: i64,
    pub completed: bool,
}

impl ActivityRecord {
    /// Creates an unsaved record stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_created_at(name, now_epoch_ms())
    }

    /// Creates an unsaved record with an explicit creation timestamp.
    pub fn with_created_at(name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: ActivityId::new(),
            name: name.into(),
            created_at,
            completed: false,
        }
    }

    /// Record carrying only `id`, for intents that address a record the
    /// caller no longer holds (delete needs no existence check).
    pub fn id_only(id: impl Into<ActivityId>) -> Self {
        Self {
            id: id.into(),
            ..Self::with_created_at(String::new(), 0)
        }
    }

    /// Returns whether the store has assigned an id yet.
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// Validates fields required before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)
    }

    /// Formats `created_at` as local `dd-MM-yyyy HH:mm`.
    ///
    /// Returns an empty string when the timestamp is out of range.
    pub fn display_created_at(&self) -> String {
        format_epoch_ms(self.created_at)
    }
}

/// Rejects blank and whitespace-only names.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    Ok(())
}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn format_epoch_ms(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(moment) => moment.format(DISPLAY_DATE_FORMAT).to_string(),
        None => String::new(),
    }
}
