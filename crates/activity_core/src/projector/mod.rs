//! View-state projection over a live activity collection.
//!
//! # Responsibility
//! - Hold the only in-process copy of what the screen shows.
//! - Turn user intents into store calls and store failures into one-shot
//!   messages.
//!
//! # Invariants
//! - `items` is written only by the live subscription, never by intents.
//! - Exactly one subscription is open per projector until teardown.
//! - The projector itself never fails.

mod activity_projector;
mod view_state;

pub use activity_projector::{
    ActivityProjector, IntentHandle, MSG_ADDED, MSG_ADD_FAILED, MSG_BLANK_NAME, MSG_DELETED,
    MSG_DELETE_FAILED, MSG_EDITED, MSG_EDIT_FAILED, MSG_TOGGLE_FAILED,
};
pub use view_state::{ViewPhase, ViewState};
