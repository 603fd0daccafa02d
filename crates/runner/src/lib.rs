//! `battlefield-runner` library crate.
//!
//! Re-exports the settings and report modules for integration testing.
//! The binary entrypoint lives in `main.rs`.

pub mod report;
pub mod settings;
