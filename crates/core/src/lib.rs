//! Domain model for the battlefield simulation client.
//!
//! Pure, I/O-free building blocks shared by the client and runner crates:
//! six-slot participant selection, the agent catalog and dataset listing,
//! status snapshots, progress interpretation, and the lifecycle view model
//! that aggregates them.

pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod progress;
pub mod selection;
pub mod snapshot;
pub mod types;
