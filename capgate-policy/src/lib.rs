//! Capability authorization for gateway operations and individual tools.

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod decision;
pub mod engine;

pub use contracts::Operation;
pub use decision::{AccessDecision, DecisionKind, DenyReason};
pub use engine::CapabilityAuthorizer;
