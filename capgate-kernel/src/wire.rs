//! Transport-agnostic request and response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Code returned when the envelope itself cannot be decoded.
pub const BAD_REQUEST: &str = "bad_request";

/// Incoming request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Operation name such as `tools.call`.
    pub op: String,
    /// Opaque capability token. Absence counts as a verification failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Operation parameters.
    #[serde(default)]
    pub params: Value,
}

/// Parameters of `tools.list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Optional tag filter; empty means no filter.
    #[serde(default, alias = "tag_filter")]
    pub tags: Vec<String>,
}

/// Parameters of `tools.get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetParams {
    /// Tool to describe.
    #[serde(alias = "name")]
    pub tool_name: String,
}

/// Parameters of `tools.call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallParams {
    /// Tool to run.
    #[serde(alias = "name")]
    pub tool_name: String,
    /// Named arguments; omitted means none.
    #[serde(default)]
    pub arguments: Value,
}

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine readable error code.
    pub code: String,
    /// Human readable message, safe for untrusted callers.
    pub message: String,
}

/// Outgoing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// True when `result` is present.
    pub ok: bool,
    /// Operation result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseEnvelope {
    /// Builds a success response.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}
