//! Tool handler trait and per-call context.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use capgate_primitives::{CallId, CapabilityPattern, HandlerError, PrincipalId};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Context handed to a handler for a single verified call.
#[derive(Debug, Clone)]
pub struct CallContext {
    call_id: CallId,
    principal: PrincipalId,
    capabilities: Arc<BTreeSet<CapabilityPattern>>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// Creates a context for the supplied caller.
    #[must_use]
    pub fn new(
        call_id: CallId,
        principal: PrincipalId,
        capabilities: Arc<BTreeSet<CapabilityPattern>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            call_id,
            principal,
            capabilities,
            cancellation,
        }
    }

    /// Returns the call correlation id.
    #[must_use]
    pub const fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Returns the verified principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Returns the capabilities granted to the caller.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<CapabilityPattern> {
        &self.capabilities
    }

    /// Returns the token cancelled when the caller abandons the call.
    ///
    /// Long-running handlers should poll it to stop early.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Trait implemented by tool executors.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with validated arguments.
    async fn invoke(&self, ctx: CallContext, arguments: Value) -> Result<Value, HandlerError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Send + Sync + Fn(CallContext, Value) -> Fut,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn invoke(&self, ctx: CallContext, arguments: Value) -> Result<Value, HandlerError> {
        (self)(ctx, arguments).await
    }
}
