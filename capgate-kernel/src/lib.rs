//! Capability-gated tool discovery and invocation.
//!
//! [`InvocationGateway`] verifies a capability token, checks the operation's
//! meta-capability and the tool's own requirements, validates arguments, and
//! only then runs the handler. [`DiscoveryService`] serves the two disclosure
//! tiers: short summaries for listing, full schemas on request. Both hide
//! tools the caller may not use behind the same not-found answer given for
//! tools that do not exist. [`RequestRouter`] puts the gateway behind a
//! JSON envelope so any byte transport can carry it.

#![warn(missing_docs, clippy::pedantic)]

mod audit;
mod discovery;
mod gateway;
mod router;
pub mod wire;

pub use audit::{
    AuditEvent, AuditOutcome, AuditSink, CollectingAuditSink, CompositeAuditSink,
    TracingAuditSink,
};
pub use discovery::DiscoveryService;
pub use gateway::{
    CallOptions, DEFAULT_SERVER_NAME, GatewayBuilder, InvocationGateway, ToolOutput,
};
pub use router::{HEALTH_OP, RequestRouter};
