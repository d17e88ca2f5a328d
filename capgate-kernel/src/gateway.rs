//! Final enforcement point in front of tool handlers.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use capgate_policy::{CapabilityAuthorizer, Operation};
use capgate_primitives::{
    CallId, ConfigResult, GatewayError, GatewayResult, HandlerError, PrincipalId,
    ServerManifest, ValidationError,
};
use capgate_tokens::{TokenClaims, TokenCodec};
use capgate_tools::{CallContext, FullSchema, TagFilter, Tool, ToolRegistry, ToolSummary};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::audit::{AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::discovery::DiscoveryService;

/// Default server name reported by `server.describe`.
pub const DEFAULT_SERVER_NAME: &str = "capgate";

/// Per-call controls supplied by the transport.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    timeout: Option<Duration>,
    cancellation: CancellationToken,
}

impl CallOptions {
    /// Creates options that inherit the gateway's default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the gateway's default timeout for this call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Ties the call to a caller-owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns the per-call timeout override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the caller's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Successful `tools.call` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    /// Name of the tool that ran.
    pub name: String,
    /// Value returned by the handler.
    pub result: Value,
}

/// Verifies tokens and enforces capabilities before any tool runs.
pub struct InvocationGateway {
    codec: Arc<TokenCodec>,
    discovery: DiscoveryService,
    manifest: ServerManifest,
    audit: Arc<dyn AuditSink>,
    default_timeout: Option<Duration>,
}

impl fmt::Debug for InvocationGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationGateway")
            .field("server", &self.manifest.name())
            .field("tools", &self.discovery.registry().len())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl InvocationGateway {
    /// Starts building a gateway over `registry`, verifying tokens with `codec`.
    #[must_use]
    pub fn builder(codec: Arc<TokenCodec>, registry: Arc<ToolRegistry>) -> GatewayBuilder {
        GatewayBuilder {
            codec,
            registry,
            manifest: None,
            audit: Arc::new(TracingAuditSink),
            default_timeout: None,
        }
    }

    /// Returns the discovery service used for listings and schema lookups.
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    /// Returns the server manifest.
    #[must_use]
    pub fn manifest(&self) -> &ServerManifest {
        &self.manifest
    }

    /// Returns the timeout applied when a call does not supply one.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Verifies `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns an auth error when the token is missing, malformed, forged,
    /// or expired.
    pub fn authenticate(&self, token: &str) -> GatewayResult<TokenClaims> {
        Ok(self.codec.verify(token)?)
    }

    /// Lists the tools visible to the token holder.
    ///
    /// # Errors
    ///
    /// Returns an auth error when the token is invalid or lacks `tools:list`.
    pub fn list_tools(
        &self,
        token: &str,
        tags: Option<&TagFilter>,
    ) -> GatewayResult<Vec<ToolSummary>> {
        let claims = self.codec.verify(token)?;
        self.discovery.list_visible(&claims, tags)
    }

    /// Returns the full schema of a tool visible to the token holder.
    ///
    /// # Errors
    ///
    /// Returns an auth error for invalid tokens or a missing `tools:get`, and
    /// a not-found error for missing or hidden tools.
    pub fn get_schema(&self, token: &str, name: &str) -> GatewayResult<FullSchema> {
        let claims = self.codec.verify(token)?;
        self.discovery.get_schema(&claims, name)
    }

    /// Describes the server to holders of `server:describe`.
    ///
    /// # Errors
    ///
    /// Returns an auth error when the token is invalid or lacks the capability.
    pub fn describe(&self, token: &str) -> GatewayResult<ServerManifest> {
        let claims = self.codec.verify(token)?;
        self.authorizer()
            .require_operation(&claims, Operation::DescribeServer)?;
        Ok(self.manifest.clone())
    }

    /// Runs `tool_name` on behalf of the token holder.
    ///
    /// Gates run in order and stop at the first failure: token verification,
    /// `tools:call`, lookup, tool capabilities, argument validation, dispatch.
    /// Exactly one audit event is recorded per call.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing gate, or the handler's failure,
    /// timeout, or cancellation.
    pub async fn call(
        &self,
        token: &str,
        tool_name: &str,
        arguments: Value,
        options: CallOptions,
    ) -> GatewayResult<ToolOutput> {
        let call_id = CallId::random();
        let timestamp = self.codec.now();
        let started = Instant::now();

        let (principal, result) = match self.codec.verify(token) {
            Ok(claims) => {
                let principal = claims.principal_id().clone();
                let result = self
                    .authorize_and_dispatch(call_id, claims, tool_name, arguments, &options)
                    .await;
                (Some(principal), result)
            }
            Err(err) => (None, Err(err.into())),
        };

        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(err) => AuditOutcome::from(err),
        };
        self.audit.record(&AuditEvent {
            call_id,
            principal,
            tool: tool_name.to_owned(),
            outcome,
            duration: started.elapsed(),
            timestamp,
        });

        result.map(|result| ToolOutput {
            name: tool_name.to_owned(),
            result,
        })
    }

    /// Refuses a call whose request could not be decoded.
    ///
    /// The token is verified first, so an invalid token still yields an auth
    /// error. One audit event is recorded either way.
    #[must_use]
    pub fn refuse_call(&self, token: &str, tool_name: &str, error: ValidationError) -> GatewayError {
        let timestamp = self.codec.now();
        let started = Instant::now();
        let (principal, err) = match self.codec.verify(token) {
            Ok(claims) => (Some(claims.principal_id().clone()), GatewayError::from(error)),
            Err(err) => (None, GatewayError::from(err)),
        };

        self.audit.record(&AuditEvent {
            call_id: CallId::random(),
            principal,
            tool: tool_name.to_owned(),
            outcome: AuditOutcome::from(&err),
            duration: started.elapsed(),
            timestamp,
        });
        err
    }

    fn authorizer(&self) -> &CapabilityAuthorizer {
        self.discovery.authorizer()
    }

    async fn authorize_and_dispatch(
        &self,
        call_id: CallId,
        claims: TokenClaims,
        tool_name: &str,
        arguments: Value,
        options: &CallOptions,
    ) -> GatewayResult<Value> {
        self.authorizer()
            .require_operation(&claims, Operation::CallTool)?;
        let tool = self.discovery.resolve(&claims, tool_name)?;
        let arguments = tool.definition().schema().validate(&arguments)?;

        let ctx = CallContext::new(
            call_id,
            claims.principal_id().clone(),
            Arc::new(claims.capabilities().clone()),
            options.cancellation().child_token(),
        );
        let timeout = options.timeout().or(self.default_timeout);

        debug!(%call_id, principal = %claims.principal_id(), tool = tool_name, "dispatching tool");
        dispatch(&tool, ctx, arguments, timeout)
            .await
            .inspect_err(|err| log_handler_failure(call_id, claims.principal_id(), tool_name, err))
            .map_err(Into::into)
    }
}

async fn dispatch(
    tool: &Tool,
    ctx: CallContext,
    arguments: Value,
    timeout: Option<Duration>,
) -> Result<Value, HandlerError> {
    let cancellation = ctx.cancellation().clone();
    let invocation = AssertUnwindSafe(tool.invoke(ctx, arguments))
        .catch_unwind()
        .map(|outcome| outcome.unwrap_or_else(|_| Err(HandlerError::failed("tool panicked"))));
    let bounded = async move {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or(Err(HandlerError::Timeout)),
            None => invocation.await,
        }
    };

    let result = tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(HandlerError::Cancelled),
        result = bounded => result,
    };
    if matches!(result, Err(HandlerError::Timeout)) {
        cancellation.cancel();
    }
    result
}

fn log_handler_failure(call_id: CallId, principal: &PrincipalId, tool: &str, err: &HandlerError) {
    warn!(%call_id, %principal, tool, error = %err, "tool call failed");
}

/// Builder for [`InvocationGateway`].
pub struct GatewayBuilder {
    codec: Arc<TokenCodec>,
    registry: Arc<ToolRegistry>,
    manifest: Option<ServerManifest>,
    audit: Arc<dyn AuditSink>,
    default_timeout: Option<Duration>,
}

impl fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("manifest", &self.manifest)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Sets the manifest returned by `server.describe`.
    #[must_use]
    pub fn manifest(mut self, manifest: ServerManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Replaces the default tracing audit sink.
    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Sets the timeout applied to calls that do not supply one. `None`
    /// leaves handlers unbounded.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Builds the gateway.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the default manifest or the
    /// authorizer cannot be constructed.
    pub fn build(self) -> ConfigResult<InvocationGateway> {
        let manifest = match self.manifest {
            Some(manifest) => manifest,
            None => ServerManifest::builder().name(DEFAULT_SERVER_NAME)?.build()?,
        };
        let discovery = DiscoveryService::new(self.registry, CapabilityAuthorizer::new()?);

        Ok(InvocationGateway {
            codec: self.codec,
            discovery,
            manifest,
            audit: self.audit,
            default_timeout: self.default_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use capgate_primitives::{AuthError, GatewayError};
    use capgate_tokens::SigningSecret;
    use capgate_tools::{ParamSpec, ParamType};
    use serde_json::json;

    use crate::audit::CollectingAuditSink;

    const ALL: [&str; 5] = ["tools:list", "tools:get", "tools:call", "server:describe", "tool:*"];

    async fn slow(ctx: CallContext, _args: Value) -> Result<Value, HandlerError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(json!(ctx.principal().as_str()))
    }

    async fn whoami(ctx: CallContext, _args: Value) -> Result<Value, HandlerError> {
        Ok(json!({ "principal": ctx.principal().as_str(), "call_id": ctx.call_id().to_string() }))
    }

    async fn boom(_ctx: CallContext, _args: Value) -> Result<Value, HandlerError> {
        panic!("handler bug");
    }

    async fn fails(_ctx: CallContext, _args: Value) -> Result<Value, HandlerError> {
        Err(HandlerError::failed("backend unavailable"))
    }

    fn register<H: capgate_tools::ToolHandler + 'static>(registry: &ToolRegistry, name: &str, handler: H) {
        let tool = Tool::builder(name)
            .short_description("test tool")
            .param(ParamSpec::optional("note", ParamType::String))
            .build(handler)
            .unwrap();
        registry.register(tool).unwrap();
    }

    fn fixture() -> (InvocationGateway, Arc<TokenCodec>, Arc<CollectingAuditSink>) {
        let codec = Arc::new(TokenCodec::new(SigningSecret::new(vec![7u8; 32]).unwrap()));
        let registry = ToolRegistry::new();
        register(&registry, "util.whoami", whoami);
        register(&registry, "util.slow", slow);
        register(&registry, "util.boom", boom);
        register(&registry, "util.fails", fails);
        let audit = Arc::new(CollectingAuditSink::new());
        let gateway = InvocationGateway::builder(Arc::clone(&codec), Arc::new(registry))
            .audit_sink(audit.clone())
            .default_timeout(Some(Duration::from_secs(5)))
            .build()
            .unwrap();
        (gateway, codec, audit)
    }

    fn token(codec: &TokenCodec, caps: &[&str]) -> String {
        codec
            .mint("tester", caps.iter().copied(), chrono::Duration::hours(1))
            .unwrap()
    }

    #[tokio::test]
    async fn handler_sees_verified_principal() {
        let (gateway, codec, audit) = fixture();
        let output = gateway
            .call(&token(&codec, &ALL), "util.whoami", Value::Null, CallOptions::new())
            .await
            .unwrap();
        assert_eq!(output.name, "util.whoami");
        assert_eq!(output.result["principal"], "tester");

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(output.result["call_id"], events[0].call_id.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_handler_error() {
        let (gateway, codec, audit) = fixture();
        let err = gateway
            .call(
                &token(&codec, &ALL),
                "util.slow",
                json!({}),
                CallOptions::new().with_timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Handler(HandlerError::Timeout));
        assert_eq!(audit.events()[0].outcome, AuditOutcome::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_applies() {
        let (gateway, codec, _) = fixture();
        let err = gateway
            .call(&token(&codec, &ALL), "util.slow", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_stops_dispatch() {
        let (gateway, codec, audit) = fixture();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = gateway
            .call(
                &token(&codec, &ALL),
                "util.slow",
                json!({}),
                CallOptions::new().with_cancellation(cancel),
            )
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Handler(HandlerError::Cancelled));
        assert_eq!(audit.events()[0].outcome, AuditOutcome::Cancelled);
    }

    #[tokio::test]
    async fn panics_and_failures_are_wrapped() {
        let (gateway, codec, _) = fixture();
        let token = token(&codec, &ALL);

        let err = gateway
            .call(&token, "util.boom", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Handler(HandlerError::failed("tool panicked")));

        let err = gateway
            .call(&token, "util.fails", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.public_message(), "tool failed: backend unavailable");
    }

    #[tokio::test]
    async fn rejected_tokens_are_audited_without_principal() {
        let (gateway, _, audit) = fixture();
        let err = gateway
            .call("not-a-token", "util.whoami", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Auth(AuthError::Malformed));

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].principal.is_none());
        assert_eq!(events[0].outcome, AuditOutcome::Denied { reason: "malformed" });
    }

    #[tokio::test]
    async fn call_requires_meta_capability() {
        let (gateway, codec, audit) = fixture();
        let err = gateway
            .call(
                &token(&codec, &["tools:list", "tool:*"]),
                "util.whoami",
                json!({}),
                CallOptions::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert_eq!(audit.events()[0].principal.as_ref().unwrap().as_str(), "tester");
    }

    #[test]
    fn refused_calls_check_the_token_first() {
        let (gateway, codec, audit) = fixture();
        let bad_params = || ValidationError::new("params", "missing field `tool_name`");

        let err = gateway.refuse_call("", "", bad_params());
        assert_eq!(err.code(), "unauthorized");

        let err = gateway.refuse_call(&token(&codec, &ALL), "util.whoami", bad_params());
        assert_eq!(err.code(), "invalid_arguments");

        let events = audit.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].principal.is_none());
        assert!(matches!(events[0].outcome, AuditOutcome::Denied { .. }));
        assert_eq!(events[1].tool, "util.whoami");
        assert_eq!(
            events[1].outcome,
            AuditOutcome::InvalidArguments {
                field: "params".into()
            }
        );
    }

    #[test]
    fn describe_requires_capability() {
        let (gateway, codec, _) = fixture();
        let manifest = gateway.describe(&token(&codec, &ALL)).unwrap();
        assert_eq!(manifest.name(), DEFAULT_SERVER_NAME);

        let err = gateway
            .describe(&token(&codec, &["tools:list"]))
            .unwrap_err();
        assert_eq!(err, GatewayError::Auth(AuthError::InsufficientCapability));
    }
}
