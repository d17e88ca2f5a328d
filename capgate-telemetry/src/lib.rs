//! Observability utilities for capgate.

#![warn(missing_docs, clippy::pedantic)]

pub mod health;
pub mod tracing_support;

pub use health::HealthReport;
pub use tracing_support::{LogFormat, TelemetryConfig, TelemetryError, init_tracing};
