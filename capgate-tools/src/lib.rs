//! Tool catalog: definitions, argument schemas, handlers, and the registry.
//!
//! The registry is a pure catalog. It knows nothing about capabilities beyond
//! storing each tool's requirements; authorization is layered on by callers.

#![warn(missing_docs, clippy::pedantic)]

pub mod definition;
pub mod handler;
pub mod registry;
pub mod schema;

pub use definition::{FullSchema, Tool, ToolBuilder, ToolDefinition, ToolSummary};
pub use handler::{CallContext, ToolHandler};
pub use registry::{TagFilter, ToolRegistry};
pub use schema::{ParamSpec, ParamType, ToolSchema};
