//! Domain model for the activity list.
//!
//! # Responsibility
//! - Define the single record type shared by store, projector and UI.
//! - Keep name validation in one place so every write path agrees.
//!
//! # Invariants
//! - A persisted record always has a store-assigned, non-empty `id`.
//! - Deletion is terminal; there are no tombstones.

pub mod activity;
