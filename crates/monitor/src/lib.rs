//! Alert monitor daemon
//!
//! Wires the metric store and alert engine to configuration, a log-backed
//! notification service, periodic maintenance and the HTTP endpoints.

pub mod api;
pub mod config;
pub mod notifier;
