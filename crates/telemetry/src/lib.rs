#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Lattice Telemetry
//!
//! This crate provides the observability infrastructure for the Lattice
//! engine, including structured logging initialization, a Prometheus
//! metrics endpoint, and abstract sinks for decoupling metric
//! instrumentation from the backend.

/// The operator HTTP surface: `/metrics`, `/healthz`, `/readyz`, and
/// `/statusz`, with readiness reported by the engine via [`http::StatusSource`].
pub mod http;
/// Observability setup: structured logging and sink installation.
pub mod init;
/// The concrete implementation of metrics sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;
/// A simple RAII timer for measuring the duration of a load attempt.
pub mod time;

// Re-export the public helper functions for easy access to the global sinks.
pub use sinks::{error_metrics, sync_metrics};
