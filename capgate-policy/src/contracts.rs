//! Operations a caller may request.

use capgate_primitives::meta;
use serde::{Deserialize, Serialize};

/// Protocol operation gated by a meta-capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `tools.list`
    ListTools,
    /// `tools.get`
    GetSchema,
    /// `tools.call`
    CallTool,
    /// `server.describe`
    DescribeServer,
}

impl Operation {
    /// Returns the meta-capability a caller must hold.
    #[must_use]
    pub const fn meta_capability(self) -> &'static str {
        match self {
            Self::ListTools => meta::TOOLS_LIST,
            Self::GetSchema => meta::TOOLS_GET,
            Self::CallTool => meta::TOOLS_CALL,
            Self::DescribeServer => meta::SERVER_DESCRIBE,
        }
    }

    /// Returns the wire name of the operation.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ListTools => "tools.list",
            Self::GetSchema => "tools.get",
            Self::CallTool => "tools.call",
            Self::DescribeServer => "server.describe",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "tools.list" => Some(Self::ListTools),
            "tools.get" => Some(Self::GetSchema),
            "tools.call" => Some(Self::CallTool),
            "server.describe" => Some(Self::DescribeServer),
            _ => None,
        }
    }
}
