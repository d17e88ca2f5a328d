//! Capability-token authorization and tiered tool disclosure.
//!
//! Depend on this crate to get the gateway and its building blocks behind
//! feature flags. Disable default features to pull in only the pieces you
//! need, e.g. `tokens` alone for a service that mints tokens but never
//! serves tools.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use capgate_primitives as primitives;

/// Token minting and verification (enabled by `tokens` feature).
#[cfg(feature = "tokens")]
pub use capgate_tokens as tokens;

/// Tool definitions and the registry (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use capgate_tools as tools;

/// Capability authorization (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use capgate_policy as policy;

/// Discovery, invocation, audit, and wire routing (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use capgate_kernel as kernel;

/// Logging and health reporting (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use capgate_telemetry as telemetry;

/// Start-up configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use capgate_config as config;

/// Types most servers need, in one import.
#[cfg(feature = "kernel")]
pub mod prelude {
    pub use capgate_kernel::{CallOptions, InvocationGateway, RequestRouter};
    pub use capgate_primitives::{
        CapabilityPattern, ConfigError, ConfigResult, GatewayError, GatewayResult, HandlerError,
        ServerManifest,
    };
    pub use capgate_tokens::{SigningSecret, TokenCodec};
    pub use capgate_tools::{CallContext, ParamSpec, ParamType, Tool, ToolRegistry};
}
