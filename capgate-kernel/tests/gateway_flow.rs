use std::sync::Arc;
use std::time::Duration;

use capgate_kernel::wire::ResponseEnvelope;
use capgate_kernel::{
    AuditOutcome, CallOptions, CollectingAuditSink, InvocationGateway, RequestRouter,
};
use capgate_primitives::{GatewayError, HandlerError, NotFoundError, ServerManifest};
use capgate_tokens::{SigningSecret, TokenCodec};
use capgate_tools::{CallContext, ParamSpec, ParamType, Tool, ToolRegistry};
use serde_json::{Value, json};

const DEMO_CAPS: [&str; 4] = ["tools:list", "tools:get", "tools:call", "tool:math:*"];

async fn add(_ctx: CallContext, args: Value) -> Result<Value, HandlerError> {
    let a = args["a"].as_f64().unwrap_or_default();
    let b = args["b"].as_f64().unwrap_or_default();
    Ok(json!(a + b))
}

async fn ping(ctx: CallContext, _args: Value) -> Result<Value, HandlerError> {
    Ok(json!({ "pong": ctx.principal().as_str() }))
}

struct Harness {
    codec: Arc<TokenCodec>,
    gateway: Arc<InvocationGateway>,
    audit: Arc<CollectingAuditSink>,
}

impl Harness {
    fn new() -> Self {
        let codec = Arc::new(TokenCodec::new(
            SigningSecret::new(b"integration-secret-with-32-bytes!!".to_vec()).unwrap(),
        ));

        let registry = ToolRegistry::new();
        registry
            .register(
                Tool::builder("math.add")
                    .documentation("Add two numbers a and b.\n\nReturns their sum.")
                    .param(ParamSpec::required("a", ParamType::Number))
                    .param(ParamSpec::required("b", ParamType::Number))
                    .returns(ParamType::Number)
                    .require("tool:math:add")
                    .tag("math")
                    .tag("safe")
                    .build(add)
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Tool::builder("geometry.add")
                    .short_description("Add two vectors.")
                    .param(ParamSpec::required("a", ParamType::Array))
                    .param(ParamSpec::required("b", ParamType::Array))
                    .require("tool:geometry:add")
                    .build(add)
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Tool::builder("util.ping")
                    .short_description("Liveness check open to every caller.")
                    .build(ping)
                    .unwrap(),
            )
            .unwrap();

        let audit = Arc::new(CollectingAuditSink::new());
        let gateway = InvocationGateway::builder(Arc::clone(&codec), Arc::new(registry))
            .manifest(
                ServerManifest::builder()
                    .name("integration")
                    .unwrap()
                    .description("integration gateway")
                    .build()
                    .unwrap(),
            )
            .audit_sink(audit.clone())
            .default_timeout(Some(Duration::from_secs(5)))
            .build()
            .unwrap();

        Self {
            codec,
            gateway: Arc::new(gateway),
            audit,
        }
    }

    fn token(&self, caps: &[&str]) -> String {
        self.codec
            .mint("demo", caps.iter().copied(), chrono::Duration::seconds(3600))
            .unwrap()
    }
}

#[tokio::test]
async fn end_to_end_demo_scenario() {
    let harness = Harness::new();
    let token = harness.token(&DEMO_CAPS);

    let listed = harness.gateway.list_tools(&token, None).unwrap();
    let names: Vec<&str> = listed.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["math.add", "util.ping"]);
    assert_eq!(listed[0].short_description, "Add two numbers a and b.");

    let schema = harness.gateway.get_schema(&token, "math.add").unwrap();
    assert_eq!(schema.input_schema["required"], json!(["a", "b"]));

    let output = harness
        .gateway
        .call(&token, "math.add", json!({"a": 2, "b": 3}), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(output.result, json!(5.0));
    assert_eq!(harness.audit.events().len(), 1);
}

#[tokio::test]
async fn wildcard_grant_covers_family_only() {
    let harness = Harness::new();
    let token = harness.token(&DEMO_CAPS);

    let err = harness
        .gateway
        .call(&token, "geometry.add", json!({"a": [1], "b": [2]}), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::NotFound(NotFoundError::UnknownOrForbidden));

    let missing = harness
        .gateway
        .call(&token, "geometry.scale", json!({}), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, missing);
}

#[tokio::test]
async fn open_tools_need_only_meta_capabilities() {
    let harness = Harness::new();
    let token = harness.token(&["tools:list", "tools:call"]);

    let listed = harness.gateway.list_tools(&token, None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "util.ping");

    let output = harness
        .gateway
        .call(&token, "util.ping", Value::Null, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(output.result["pong"], "demo");
}

#[tokio::test]
async fn validation_names_the_offending_field() {
    let harness = Harness::new();
    let token = harness.token(&DEMO_CAPS);

    let err = harness
        .gateway
        .call(&token, "math.add", json!({"a": 2, "b": "three"}), CallOptions::new())
        .await
        .unwrap_err();
    match &err {
        GatewayError::Validation(validation) => assert_eq!(validation.field, "b"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        harness.audit.events()[0].outcome,
        AuditOutcome::InvalidArguments { field: "b".into() }
    );
}

#[tokio::test]
async fn expired_and_forged_tokens_are_rejected_alike() {
    let harness = Harness::new();
    let expired = harness
        .codec
        .mint("demo", DEMO_CAPS, chrono::Duration::seconds(-1))
        .unwrap();
    let foreign = TokenCodec::new(SigningSecret::new(vec![9u8; 32]).unwrap())
        .mint("demo", DEMO_CAPS, chrono::Duration::seconds(3600))
        .unwrap();

    let expired_err = harness.gateway.list_tools(&expired, None).unwrap_err();
    let forged_err = harness.gateway.list_tools(&foreign, None).unwrap_err();
    assert_eq!(expired_err.code(), forged_err.code());
    assert_eq!(expired_err.public_message(), forged_err.public_message());
}

#[tokio::test]
async fn every_call_is_audited_once() {
    let harness = Harness::new();
    let token = harness.token(&DEMO_CAPS);

    let _ = harness
        .gateway
        .call(&token, "math.add", json!({"a": 1, "b": 1}), CallOptions::new())
        .await;
    let _ = harness
        .gateway
        .call(&token, "geometry.add", json!({}), CallOptions::new())
        .await;
    let _ = harness
        .gateway
        .call("", "math.add", json!({}), CallOptions::new())
        .await;

    let outcomes: Vec<&str> = harness
        .audit
        .events()
        .iter()
        .map(|event| event.outcome.code())
        .collect();
    assert_eq!(outcomes, ["ok", "not_found", "denied"]);
}

async fn send(router: &RequestRouter, request: Value) -> ResponseEnvelope {
    let bytes = router.handle(request.to_string().as_bytes()).await;
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn wire_router_serves_the_scenario() {
    let harness = Harness::new();
    let router = RequestRouter::new(Arc::clone(&harness.gateway));
    let token = harness.token(&DEMO_CAPS);

    let listed = send(
        &router,
        json!({"op": "tools.list", "token": token, "params": {"tags": ["math"]}}),
    )
    .await;
    assert!(listed.ok);
    let tools = &listed.result.unwrap()["tools"];
    assert_eq!(tools.as_array().unwrap().len(), 1);
    assert_eq!(tools[0]["name"], "math.add");

    let schema = send(
        &router,
        json!({"op": "tools.get", "token": token, "params": {"tool_name": "math.add"}}),
    )
    .await;
    assert_eq!(schema.result.unwrap()["name"], "math.add");

    let called = send(
        &router,
        json!({
            "op": "tools.call",
            "token": token,
            "params": {"tool_name": "math.add", "arguments": {"a": 2, "b": 3}}
        }),
    )
    .await;
    assert_eq!(called.result.unwrap(), json!({"name": "math.add", "result": 5.0}));

    let hidden = send(
        &router,
        json!({"op": "tools.get", "token": token, "params": {"tool_name": "geometry.add"}}),
    )
    .await;
    assert_eq!(hidden.error.unwrap().code, "not_found");
}

#[tokio::test]
async fn describe_over_the_wire() {
    let harness = Harness::new();
    let router = RequestRouter::new(Arc::clone(&harness.gateway));

    let denied = send(
        &router,
        json!({"op": "server.describe", "token": harness.token(&DEMO_CAPS)}),
    )
    .await;
    assert_eq!(denied.error.unwrap().code, "forbidden");

    let described = send(
        &router,
        json!({"op": "server.describe", "token": harness.token(&["server:describe"])}),
    )
    .await;
    let manifest = described.result.unwrap();
    assert_eq!(manifest["name"], "integration");
    assert_eq!(manifest["description"], "integration gateway");
}

#[tokio::test]
async fn undecodable_call_params_are_audited() {
    let harness = Harness::new();
    let router = RequestRouter::new(Arc::clone(&harness.gateway));

    let anonymous = send(&router, json!({"op": "tools.call", "params": {"arguments": {}}})).await;
    assert_eq!(anonymous.error.unwrap().code, "unauthorized");

    let malformed = send(
        &router,
        json!({
            "op": "tools.call",
            "token": harness.token(&DEMO_CAPS),
            "params": {"tool_name": "math.add", "arguments": {}, "name": 7}
        }),
    )
    .await;
    assert_eq!(malformed.error.unwrap().code, "invalid_arguments");

    let events = harness.audit.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].principal.is_none());
    assert_eq!(events[0].outcome.code(), "denied");
    assert_eq!(events[1].principal.as_ref().unwrap().as_str(), "demo");
    assert_eq!(events[1].tool, "math.add");
    assert_eq!(
        events[1].outcome,
        AuditOutcome::InvalidArguments {
            field: "params".into()
        }
    );
}

#[tokio::test]
async fn health_does_not_reveal_the_manifest() {
    let harness = Harness::new();
    let router = RequestRouter::new(Arc::clone(&harness.gateway));

    let health = send(&router, json!({"op": "server.health"})).await;
    assert_eq!(health.result.unwrap(), json!({"ok": true}));

    let describe = send(&router, json!({"op": "server.describe"})).await;
    assert_eq!(describe.error.unwrap().code, "unauthorized");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_gateway() {
    let harness = Harness::new();
    let token = harness.token(&DEMO_CAPS);

    let calls = (0..32).map(|n| {
        let gateway = Arc::clone(&harness.gateway);
        let token = token.clone();
        tokio::spawn(async move {
            gateway
                .call(&token, "math.add", json!({"a": n, "b": 1}), CallOptions::new())
                .await
                .map(|output| (n, output.result))
        })
    });
    let listings = (0..32).map(|_| {
        let gateway = Arc::clone(&harness.gateway);
        let token = token.clone();
        tokio::spawn(async move { gateway.list_tools(&token, None).map(|tools| tools.len()) })
    });

    let (calls, listings) = futures::future::join(
        futures::future::join_all(calls),
        futures::future::join_all(listings),
    )
    .await;

    for joined in calls {
        let (n, result) = joined.unwrap().unwrap();
        assert_eq!(result, json!(f64::from(n) + 1.0));
    }
    for joined in listings {
        assert_eq!(joined.unwrap().unwrap(), 2);
    }

    let events = harness.audit.events();
    assert_eq!(events.len(), 32);
    assert!(events.iter().all(|event| event.outcome.is_success()));
}
