//! Byte-level request routing for any transport.

use std::sync::Arc;

use bytes::Bytes;
use capgate_policy::Operation;
use capgate_primitives::{GatewayError, ValidationError};
use capgate_telemetry::HealthReport;
use capgate_tools::TagFilter;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::gateway::{CallOptions, InvocationGateway};
use crate::wire::{BAD_REQUEST, CallParams, GetParams, ListParams, RequestEnvelope, ResponseEnvelope};

/// Wire name of the unauthenticated liveness probe.
pub const HEALTH_OP: &str = "server.health";

/// Field reported when `tools.call` params cannot be decoded.
const PARAMS_FIELD: &str = "params";

/// Code returned when a result cannot be encoded.
const INTERNAL: &str = "internal";

enum RouteError {
    BadRequest(String),
    Gateway(GatewayError),
    Internal(String),
}

impl From<GatewayError> for RouteError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

/// Decodes request envelopes, runs them through the gateway, and encodes
/// the responses.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    gateway: Arc<InvocationGateway>,
}

impl RequestRouter {
    /// Creates a router over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<InvocationGateway>) -> Self {
        Self { gateway }
    }

    /// Returns the wrapped gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<InvocationGateway> {
        &self.gateway
    }

    /// Handles one encoded request with default call options.
    pub async fn handle(&self, request: &[u8]) -> Bytes {
        self.handle_with(request, CallOptions::new()).await
    }

    /// Handles one encoded request, applying `options` to `tools.call`.
    pub async fn handle_with(&self, request: &[u8], options: CallOptions) -> Bytes {
        let envelope = match serde_json::from_slice::<RequestEnvelope>(request) {
            Ok(envelope) => self.route(envelope, options).await,
            Err(err) => {
                debug!(error = %err, "undecodable request envelope");
                ResponseEnvelope::failure(BAD_REQUEST, "request envelope could not be decoded")
            }
        };
        encode(&envelope)
    }

    async fn route(&self, request: RequestEnvelope, options: CallOptions) -> ResponseEnvelope {
        let outcome = self.dispatch(&request, options).await;
        match outcome {
            Ok(result) => ResponseEnvelope::success(result),
            Err(RouteError::BadRequest(message)) => ResponseEnvelope::failure(BAD_REQUEST, message),
            Err(RouteError::Internal(reason)) => {
                warn!(op = %request.op, reason = %reason, "result encoding failed");
                ResponseEnvelope::failure(INTERNAL, "internal error")
            }
            Err(RouteError::Gateway(err)) => {
                debug!(op = %request.op, code = err.code(), "request refused");
                ResponseEnvelope::failure(err.code(), err.public_message())
            }
        }
    }

    async fn dispatch(
        &self,
        request: &RequestEnvelope,
        options: CallOptions,
    ) -> Result<Value, RouteError> {
        if request.op == HEALTH_OP {
            return to_value(&HealthReport::healthy());
        }

        let operation = Operation::from_wire_name(&request.op)
            .ok_or_else(|| RouteError::BadRequest(format!("unknown operation `{}`", request.op)))?;
        let token = request.token.as_deref().unwrap_or_default();

        match operation {
            Operation::ListTools => {
                let claims = self.gateway.authenticate(token)?;
                let params: ListParams = decode(&request.params).map_err(RouteError::BadRequest)?;
                let tags: TagFilter = params.tags.into_iter().collect();
                let tools = self.gateway.discovery().list_visible(&claims, Some(&tags))?;
                Ok(json!({ "tools": tools }))
            }
            Operation::GetSchema => {
                let claims = self.gateway.authenticate(token)?;
                let params: GetParams = decode(&request.params).map_err(RouteError::BadRequest)?;
                let schema = self
                    .gateway
                    .discovery()
                    .get_schema(&claims, &params.tool_name)?;
                to_value(&schema)
            }
            Operation::CallTool => {
                let params: CallParams = match decode(&request.params) {
                    Ok(params) => params,
                    Err(reason) => {
                        let err = self.gateway.refuse_call(
                            token,
                            requested_tool(&request.params),
                            ValidationError::new(PARAMS_FIELD, reason),
                        );
                        return Err(err.into());
                    }
                };
                let output = self
                    .gateway
                    .call(token, &params.tool_name, params.arguments, options)
                    .await?;
                to_value(&output)
            }
            Operation::DescribeServer => {
                let manifest = self.gateway.describe(token)?;
                to_value(&manifest)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(raw: &Value) -> Result<T, String> {
    let raw = if raw.is_null() { json!({}) } else { raw.clone() };
    serde_json::from_value(raw).map_err(|err| format!("invalid params: {err}"))
}

/// Best-effort tool name for auditing a call whose params did not decode.
fn requested_tool(raw: &Value) -> &str {
    raw.get("tool_name")
        .or_else(|| raw.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, RouteError> {
    serde_json::to_value(value).map_err(|err| RouteError::Internal(err.to_string()))
}

fn encode(envelope: &ResponseEnvelope) -> Bytes {
    match serde_json::to_vec(envelope) {
        Ok(body) => Bytes::from(body),
        Err(err) => {
            warn!(error = %err, "response encoding failed");
            Bytes::from_static(
                br#"{"ok":false,"error":{"code":"internal","message":"internal error"}}"#,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use capgate_tokens::{SigningSecret, TokenCodec};
    use capgate_tools::ToolRegistry;

    fn router() -> RequestRouter {
        let codec = Arc::new(TokenCodec::new(SigningSecret::new(vec![3u8; 48]).unwrap()));
        let gateway = InvocationGateway::builder(codec, Arc::new(ToolRegistry::new()))
            .build()
            .unwrap();
        RequestRouter::new(Arc::new(gateway))
    }

    async fn send(router: &RequestRouter, request: &[u8]) -> ResponseEnvelope {
        serde_json::from_slice(&router.handle(request).await).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token_and_reveals_nothing() {
        let response = send(&router(), br#"{"op":"server.health"}"#).await;
        assert!(response.ok);
        assert_eq!(response.result.unwrap(), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn garbage_is_a_bad_request() {
        let response = send(&router(), b"{not json").await;
        assert_eq!(response.error.unwrap().code, BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_operation_is_a_bad_request() {
        let response = send(&router(), br#"{"op":"tools.delete","token":"x"}"#).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, BAD_REQUEST);
        assert!(error.message.contains("tools.delete"));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let response = send(&router(), br#"{"op":"tools.list"}"#).await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "unauthorized");
    }

    #[tokio::test]
    async fn token_is_checked_before_params() {
        let router = router();
        for request in [
            br#"{"op":"tools.get"}"#.as_slice(),
            br#"{"op":"tools.get","token":"a.b","params":{"wrong":1}}"#.as_slice(),
            br#"{"op":"tools.list","params":{"tags":"math"}}"#.as_slice(),
            br#"{"op":"tools.call","params":{"arguments":{}}}"#.as_slice(),
        ] {
            let error = send(&router, request).await.error.unwrap();
            assert_eq!(error.code, "unauthorized", "{}", String::from_utf8_lossy(request));
            assert!(!error.message.contains("tool_name"));
        }
    }
}
