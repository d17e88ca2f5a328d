//! Typed parameter lists and structural argument validation.

use std::collections::BTreeSet;

use capgate_primitives::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Field name reported when the argument payload itself is not an object.
pub const ARGUMENTS_FIELD: &str = "arguments";

/// JSON type accepted by a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// JSON string.
    String,
    /// Any JSON number, integers included.
    Number,
    /// Whole JSON number.
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Any value, including `null`.
    Any,
}

impl ParamType {
    /// Returns the JSON-Schema type keyword, if any.
    #[must_use]
    pub const fn json_type(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Number => Some("number"),
            Self::Integer => Some("integer"),
            Self::Boolean => Some("boolean"),
            Self::Array => Some("array"),
            Self::Object => Some("object"),
            Self::Any => None,
        }
    }

    /// Returns true when `value` conforms to this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    fn describe(self) -> &'static str {
        self.json_type().unwrap_or("any value")
    }
}

/// Declaration of a single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    name: String,
    kind: ParamType,
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl ParamSpec {
    /// Declares a parameter the caller must supply.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
            default: None,
        }
    }

    /// Declares a parameter the caller may omit.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Attaches documentation for the parameter.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the value injected when an optional parameter is omitted.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the accepted type.
    #[must_use]
    pub const fn kind(&self) -> ParamType {
        self.kind
    }

    /// Returns true when the caller must supply the parameter.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the parameter documentation.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the default value for omitted optional parameters.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Full parameter description of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    returns: Option<ParamType>,
}

impl ToolSchema {
    /// Creates a schema from a parameter list.
    #[must_use]
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self {
            params,
            returns: None,
        }
    }

    /// Declares the type of value the tool returns.
    #[must_use]
    pub fn with_returns(mut self, returns: ParamType) -> Self {
        self.returns = Some(returns);
        self
    }

    /// Returns the declared parameters in order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Returns the declared return type.
    #[must_use]
    pub const fn returns(&self) -> Option<ParamType> {
        self.returns
    }

    /// Checks the schema's own consistency, returning a reason on failure.
    pub(crate) fn check(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for param in &self.params {
            if param.name.trim().is_empty() {
                return Err("parameter names cannot be empty".into());
            }
            if !seen.insert(param.name.as_str()) {
                return Err(format!("parameter `{}` declared twice", param.name));
            }
            if let Some(default) = &param.default {
                if param.required {
                    return Err(format!(
                        "required parameter `{}` cannot have a default",
                        param.name
                    ));
                }
                if !param.kind.accepts(default) {
                    return Err(format!(
                        "default for `{}` is not a valid {}",
                        param.name,
                        param.kind.describe()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validates call arguments, returning them with defaults filled in.
    ///
    /// `null` is treated as an empty argument object.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first offending field: a
    /// missing required parameter, a type mismatch, or an undeclared argument.
    pub fn validate(&self, arguments: &Value) -> Result<Value, ValidationError> {
        let supplied = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(ValidationError::new(
                    ARGUMENTS_FIELD,
                    "expected an object of named arguments",
                ));
            }
        };

        let mut normalized = Map::new();
        for param in &self.params {
            match supplied.get(&param.name) {
                Some(value) if param.kind.accepts(value) => {
                    normalized.insert(param.name.clone(), value.clone());
                }
                Some(_) => {
                    return Err(ValidationError::new(
                        &param.name,
                        format!("expected {}", param.kind.describe()),
                    ));
                }
                None if param.required => {
                    return Err(ValidationError::new(&param.name, "missing required argument"));
                }
                None => {
                    if let Some(default) = &param.default {
                        normalized.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        if let Some(unexpected) = supplied
            .keys()
            .find(|key| !self.params.iter().any(|param| &param.name == *key))
        {
            return Err(ValidationError::new(unexpected, "unexpected argument"));
        }

        Ok(Value::Object(normalized))
    }

    /// Renders the parameter list as a JSON-Schema object.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut property = Map::new();
            if let Some(json_type) = param.kind.json_type() {
                property.insert("type".into(), Value::from(json_type));
            }
            if let Some(description) = &param.description {
                property.insert("description".into(), Value::from(description.clone()));
            }
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(property));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}
