//! Simulation service client and run controller.
//!
//! Provides the REST API wrapper, the backend trait the controller talks
//! through, sequential status polling, run events, and the controller
//! actor that owns the lifecycle view model.

pub mod api;
pub mod backend;
pub mod config;
pub mod controller;
pub mod events;
pub mod poll;
