//! Core shared types for capability-gated tool access.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod manifest;
mod pattern;

/// Error taxonomy shared by every capgate component.
pub use error::{
    AuthError, ConfigError, ConfigResult, GatewayError, GatewayResult, HandlerError,
    NotFoundError, ValidationError,
};
/// Identifiers for principals and individual tool calls.
pub use ids::{CallId, PrincipalId};
/// Server metadata returned by `server.describe`.
pub use manifest::{ServerManifest, ServerManifestBuilder};
/// Capability patterns and the pure matching functions.
pub use pattern::{CapabilityPattern, matches, meta, satisfies};
