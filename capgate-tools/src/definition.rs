//! Tool definitions and the registration builder.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use capgate_primitives::{CapabilityPattern, ConfigError, ConfigResult, HandlerError};
use serde::Serialize;
use serde_json::Value;

use crate::handler::{CallContext, ToolHandler};
use crate::schema::{ParamSpec, ParamType, ToolSchema};

const MAX_NAME_LEN: usize = 128;

/// Immutable metadata describing a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    name: String,
    short_description: String,
    documentation: Option<String>,
    schema: ToolSchema,
    required_capabilities: Vec<CapabilityPattern>,
    tags: BTreeSet<String>,
}

impl ToolDefinition {
    /// Returns the unique, dot-namespaced tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cheap discovery summary.
    #[must_use]
    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    /// Returns the long-form documentation.
    #[must_use]
    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Returns the capabilities a caller must hold, in declaration order.
    #[must_use]
    pub fn required_capabilities(&self) -> &[CapabilityPattern] {
        &self.required_capabilities
    }

    /// Returns the discovery tags. Tags never grant access.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the entry shown by `tools.list`.
    #[must_use]
    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            short_description: self.short_description.clone(),
            tags: self.tags.iter().cloned().collect(),
        }
    }

    /// Returns the document served by `tools.get`.
    #[must_use]
    pub fn full_schema(&self) -> FullSchema {
        FullSchema {
            name: self.name.clone(),
            short_description: self.short_description.clone(),
            documentation: self.documentation.clone(),
            input_schema: self.schema.input_schema(),
            returns: self.schema.returns(),
            tags: self.tags.iter().cloned().collect(),
        }
    }
}

/// Discovery entry: name, summary, and tags only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    /// Tool name.
    pub name: String,
    /// Short description.
    pub short_description: String,
    /// Discovery tags.
    pub tags: Vec<String>,
}

/// Complete description of a tool, served on explicit request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullSchema {
    /// Tool name.
    pub name: String,
    /// Short description.
    pub short_description: String,
    /// Long-form documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// JSON-Schema rendering of the parameters.
    pub input_schema: Value,
    /// Declared return type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<ParamType>,
    /// Discovery tags.
    pub tags: Vec<String>,
}

/// A tool definition bound to its handler.
#[derive(Clone)]
pub struct Tool {
    definition: Arc<ToolDefinition>,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.definition.name)
            .field("required_capabilities", &self.definition.required_capabilities)
            .finish_non_exhaustive()
    }
}

impl Tool {
    /// Starts building a tool with the supplied name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ToolBuilder {
        ToolBuilder {
            name: name.into(),
            short_description: None,
            documentation: None,
            params: Vec::new(),
            returns: None,
            required: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Returns the tool metadata.
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Runs the handler with already-validated arguments.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`HandlerError`].
    pub async fn invoke(&self, ctx: CallContext, arguments: Value) -> Result<Value, HandlerError> {
        self.handler.invoke(ctx, arguments).await
    }
}

/// Builder that validates a tool once, at registration time.
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    name: String,
    short_description: Option<String>,
    documentation: Option<String>,
    params: Vec<ParamSpec>,
    returns: Option<ParamType>,
    required: Vec<String>,
    tags: BTreeSet<String>,
}

impl ToolBuilder {
    /// Sets the discovery summary.
    #[must_use]
    pub fn short_description(mut self, description: impl Into<String>) -> Self {
        self.short_description = Some(description.into());
        self
    }

    /// Sets the long-form documentation. Its first non-blank line becomes the
    /// short description when none is given explicitly.
    #[must_use]
    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    /// Appends a parameter declaration.
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Declares the return type.
    #[must_use]
    pub fn returns(mut self, returns: ParamType) -> Self {
        self.returns = Some(returns);
        self
    }

    /// Adds a capability the caller must hold. Duplicates are dropped.
    #[must_use]
    pub fn require(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.required.contains(&capability) {
            self.required.push(capability);
        }
        self
    }

    /// Adds a discovery tag; blank tags are ignored.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !tag.trim().is_empty() {
            self.tags.insert(tag);
        }
        self
    }

    /// Validates the definition and binds it to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidToolName`], [`ConfigError::InvalidPattern`],
    /// [`ConfigError::MissingDescription`], or [`ConfigError::InvalidSchema`].
    pub fn build<H>(self, handler: H) -> ConfigResult<Tool>
    where
        H: ToolHandler + 'static,
    {
        validate_name(&self.name)?;

        let required_capabilities = self
            .required
            .into_iter()
            .map(CapabilityPattern::concrete)
            .collect::<ConfigResult<Vec<_>>>()?;

        let short_description = resolve_description(
            &self.name,
            self.short_description.as_deref(),
            self.documentation.as_deref(),
        )?;

        let mut schema = ToolSchema::new(self.params);
        if let Some(returns) = self.returns {
            schema = schema.with_returns(returns);
        }
        schema.check().map_err(|reason| ConfigError::InvalidSchema {
            name: self.name.clone(),
            reason,
        })?;

        let documentation = self
            .documentation
            .map(|doc| doc.trim().to_owned())
            .filter(|doc| !doc.is_empty());

        Ok(Tool {
            definition: Arc::new(ToolDefinition {
                name: self.name,
                short_description,
                documentation,
                schema,
                required_capabilities,
                tags: self.tags,
            }),
            handler: Arc::new(handler),
        })
    }
}

fn resolve_description(
    name: &str,
    explicit: Option<&str>,
    documentation: Option<&str>,
) -> ConfigResult<String> {
    explicit
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .or_else(|| {
            documentation?
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
        })
        .map(str::to_owned)
        .ok_or_else(|| ConfigError::MissingDescription {
            name: name.to_owned(),
        })
}

fn validate_name(name: &str) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidToolName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if name.is_empty() {
        return Err(invalid("tool name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(&format!("tool name length must be <= {MAX_NAME_LEN}")));
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(invalid("namespace segments cannot be empty"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(invalid(
                "tool name must contain ASCII alphanumerics, underscore, dash, or dot",
            ));
        }
    }
    Ok(())
}
