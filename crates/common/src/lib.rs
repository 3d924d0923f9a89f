#![deny(missing_docs)]

//! Shared configuration, error types, and observability primitives for Ember crates.
//!
//! Architecture role:
//! - defines coordinator/service configuration passed across layers
//! - provides common [`EmberError`] / [`Result`] contracts
//! - hosts the metrics registry used by the reconciliation loop
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`metrics`]

/// Coordinator/service configuration types.
pub mod config;
/// Shared error taxonomy.
pub mod error;
/// Metrics registry and Prometheus rendering helpers.
pub mod metrics;

pub use config::ServiceConfig;
pub use error::{EmberError, Result};
pub use metrics::{global_metrics, MetricsRegistry};
