//! Capability checks for operations and tools.

use capgate_primitives::{AuthError, CapabilityPattern, ConfigResult};
use capgate_tokens::TokenClaims;
use capgate_tools::ToolDefinition;
use tracing::{debug, warn};

use crate::contracts::Operation;
use crate::decision::{AccessDecision, DenyReason};

/// Pure, stateless authorizer over verified token claims.
///
/// Holds the parsed meta-capabilities so request paths never re-parse them.
#[derive(Debug, Clone)]
pub struct CapabilityAuthorizer {
    list: CapabilityPattern,
    get: CapabilityPattern,
    call: CapabilityPattern,
    describe: CapabilityPattern,
}

impl CapabilityAuthorizer {
    /// Creates an authorizer for the built-in operations.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a meta-capability name fails to parse.
    pub fn new() -> ConfigResult<Self> {
        Ok(Self {
            list: CapabilityPattern::concrete(Operation::ListTools.meta_capability())?,
            get: CapabilityPattern::concrete(Operation::GetSchema.meta_capability())?,
            call: CapabilityPattern::concrete(Operation::CallTool.meta_capability())?,
            describe: CapabilityPattern::concrete(Operation::DescribeServer.meta_capability())?,
        })
    }

    fn meta_for(&self, operation: Operation) -> &CapabilityPattern {
        match operation {
            Operation::ListTools => &self.list,
            Operation::GetSchema => &self.get,
            Operation::CallTool => &self.call,
            Operation::DescribeServer => &self.describe,
        }
    }

    /// Decides whether the claims grant the operation's meta-capability.
    #[must_use]
    pub fn evaluate_operation(&self, claims: &TokenClaims, operation: Operation) -> AccessDecision {
        let required = self.meta_for(operation);
        if claims.satisfies([required]) {
            AccessDecision::allow()
        } else {
            AccessDecision::deny(DenyReason::MissingMetaCapability {
                required: required.to_string(),
            })
        }
    }

    /// Decides whether the claims cover every capability the tool requires.
    ///
    /// A tool without requirements is open to any verified caller.
    #[must_use]
    pub fn evaluate_tool(&self, claims: &TokenClaims, tool: &ToolDefinition) -> AccessDecision {
        let missing: Vec<String> = tool
            .required_capabilities()
            .iter()
            .filter(|needed| !claims.satisfies([*needed]))
            .map(ToString::to_string)
            .collect();

        if missing.is_empty() {
            AccessDecision::allow()
        } else {
            AccessDecision::deny(DenyReason::MissingToolCapability { missing })
        }
    }

    /// Requires the operation's meta-capability.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InsufficientCapability`] when it is not granted.
    pub fn require_operation(
        &self,
        claims: &TokenClaims,
        operation: Operation,
    ) -> Result<(), AuthError> {
        let decision = self.evaluate_operation(claims, operation);
        if decision.is_allow() {
            return Ok(());
        }
        warn!(
            principal = %claims.principal_id(),
            operation = operation.wire_name(),
            reason = ?decision.reason(),
            "operation denied"
        );
        Err(AuthError::InsufficientCapability)
    }

    /// Returns true when the caller may see and call `tool`.
    #[must_use]
    pub fn can_access_tool(&self, claims: &TokenClaims, tool: &ToolDefinition) -> bool {
        let decision = self.evaluate_tool(claims, tool);
        if decision.is_deny() {
            debug!(
                principal = %claims.principal_id(),
                tool = tool.name(),
                reason = ?decision.reason(),
                "tool hidden from caller"
            );
        }
        decision.is_allow()
    }
}
