//! Configuration management for capgate gateways.
//!
//! Values are read once at start-up from a [`ConfigSource`] and never
//! re-read.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigSource, EnvSource, MapSource};
pub use schema::{GatewayConfig, keys};
