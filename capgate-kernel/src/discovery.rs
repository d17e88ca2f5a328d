//! Two-phase tool disclosure: cheap listings, full schemas on demand.

use std::fmt;
use std::sync::Arc;

use capgate_policy::{CapabilityAuthorizer, Operation};
use capgate_primitives::{GatewayResult, NotFoundError};
use capgate_tokens::TokenClaims;
use capgate_tools::{FullSchema, TagFilter, Tool, ToolRegistry, ToolSummary};
use tracing::debug;

/// Answers `tools.list` and `tools.get` for verified callers.
///
/// Callers only ever see tools they could invoke. A tool the caller may not
/// access is reported exactly like a tool that does not exist.
#[derive(Clone)]
pub struct DiscoveryService {
    registry: Arc<ToolRegistry>,
    authorizer: CapabilityAuthorizer,
}

impl fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("tools", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl DiscoveryService {
    /// Creates a discovery service over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, authorizer: CapabilityAuthorizer) -> Self {
        Self {
            registry,
            authorizer,
        }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the authorizer shared with the gateway.
    #[must_use]
    pub fn authorizer(&self) -> &CapabilityAuthorizer {
        &self.authorizer
    }

    /// Lists the tools visible to the caller, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an auth error when the caller lacks `tools:list`.
    pub fn list_visible(
        &self,
        claims: &TokenClaims,
        tags: Option<&TagFilter>,
    ) -> GatewayResult<Vec<ToolSummary>> {
        self.authorizer
            .require_operation(claims, Operation::ListTools)?;

        let visible: Vec<ToolSummary> = self
            .registry
            .list(tags)
            .iter()
            .filter(|tool| self.authorizer.can_access_tool(claims, tool.definition()))
            .map(|tool| tool.definition().summary())
            .collect();

        debug!(
            principal = %claims.principal_id(),
            visible = visible.len(),
            "tools listed"
        );
        Ok(visible)
    }

    /// Returns the full schema of `name` if the caller may access it.
    ///
    /// # Errors
    ///
    /// Returns an auth error when the caller lacks `tools:get`, and
    /// [`NotFoundError::UnknownOrForbidden`] when the tool is missing or hidden.
    pub fn get_schema(&self, claims: &TokenClaims, name: &str) -> GatewayResult<FullSchema> {
        self.authorizer
            .require_operation(claims, Operation::GetSchema)?;
        let tool = self.resolve(claims, name)?;
        Ok(tool.definition().full_schema())
    }

    /// Looks up `name`, hiding tools the caller may not access.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::UnknownOrForbidden`] for missing and hidden tools alike.
    pub fn resolve(&self, claims: &TokenClaims, name: &str) -> Result<Tool, NotFoundError> {
        let tool = self.registry.get(name)?;
        if self.authorizer.can_access_tool(claims, tool.definition()) {
            Ok(tool)
        } else {
            Err(NotFoundError::UnknownOrForbidden)
        }
    }
}
