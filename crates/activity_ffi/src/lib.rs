//! Mobile-facing bindings for the activity list core.

pub mod api;
