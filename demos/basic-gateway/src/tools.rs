//! Demo tools: arithmetic for everyone with `tool:math:*`, plus one tool
//! that no default token can see.

use capgate::primitives::{ConfigResult, HandlerError};
use capgate::tools::{CallContext, ParamSpec, ParamType, Tool, ToolHandler, ToolRegistry};
use serde_json::{Value, json};

/// Capabilities granted to the demo token.
pub const DEMO_CAPABILITIES: [&str; 5] = [
    "server:describe",
    "tools:list",
    "tools:get",
    "tools:call",
    "tool:math:*",
];

/// Builds the demo registry.
pub fn demo_registry() -> ConfigResult<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register(arithmetic(
        "math.add",
        "Add two floats.",
        "Add two numbers a and b and return the sum.",
        "tool:math:add",
        add,
    )?)?;
    registry.register(arithmetic(
        "math.multiply",
        "Multiply two floats.",
        "Multiply two numbers a and b and return the product.",
        "tool:math:mult",
        multiply,
    )?)?;
    registry.register(arithmetic(
        "math.divide",
        "Divide two floats.",
        "Divide a by b and return the quotient. Fails when b is zero.",
        "tool:math:div",
        divide,
    )?)?;
    registry.register(
        Tool::builder("secret.get")
            .short_description("Fetch a secret by key (demo).")
            .param(ParamSpec::required("key", ParamType::String).describe("secret name"))
            .returns(ParamType::String)
            .require("tool:secret:read")
            .tag("dangerous")
            .build(get_secret)?,
    )?;
    Ok(registry)
}

fn arithmetic<H: ToolHandler + 'static>(
    name: &str,
    summary: &str,
    documentation: &str,
    capability: &str,
    handler: H,
) -> ConfigResult<Tool> {
    Tool::builder(name)
        .short_description(summary)
        .documentation(documentation)
        .param(ParamSpec::required("a", ParamType::Number).describe("first operand"))
        .param(ParamSpec::required("b", ParamType::Number).describe("second operand"))
        .returns(ParamType::Number)
        .require(capability)
        .tag("safe")
        .tag("math")
        .build(handler)
}

fn operands(args: &Value) -> Result<(f64, f64), HandlerError> {
    match (args["a"].as_f64(), args["b"].as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(HandlerError::failed("operands must be numbers")),
    }
}

async fn add(_ctx: CallContext, args: Value) -> Result<Value, HandlerError> {
    let (a, b) = operands(&args)?;
    Ok(json!(a + b))
}

async fn multiply(_ctx: CallContext, args: Value) -> Result<Value, HandlerError> {
    let (a, b) = operands(&args)?;
    Ok(json!(a * b))
}

async fn divide(_ctx: CallContext, args: Value) -> Result<Value, HandlerError> {
    let (a, b) = operands(&args)?;
    if b.abs() < f64::EPSILON {
        return Err(HandlerError::failed("division by zero"));
    }
    Ok(json!(a / b))
}

async fn get_secret(ctx: CallContext, args: Value) -> Result<Value, HandlerError> {
    let key = args["key"].as_str().unwrap_or_default();
    tracing::info!(principal = %ctx.principal(), key, "secret requested");
    Ok(json!(format!("secret-value-for:{key}")))
}
