//! Shared error taxonomy.
//!
//! Configuration errors are fatal at start-up. Every other family is a
//! per-request outcome returned to callers without internal detail.

use thiserror::Error;

/// Result alias for registration and start-up operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result alias for request-time operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Token verification and authorization failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum AuthError {
    /// The token could not be parsed into payload and signature.
    #[error("token is malformed")]
    Malformed,
    /// The signature does not match the payload.
    #[error("token signature is invalid")]
    InvalidSignature,
    /// The token is past its expiry.
    #[error("token has expired")]
    Expired,
    /// The caller lacks a required meta-capability.
    #[error("insufficient capability")]
    InsufficientCapability,
}

impl AuthError {
    /// Stable identifier used for audit records.
    #[must_use]
    pub const fn reason_code(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::InsufficientCapability => "insufficient_capability",
        }
    }
}

/// Returned both for unknown tools and for tools the caller may not see.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum NotFoundError {
    /// Tool is absent or hidden from the caller.
    #[error("tool not found")]
    UnknownOrForbidden,
}

/// Arguments did not conform to the tool's schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid argument `{field}`: {reason}")]
pub struct ValidationError {
    /// Offending field name.
    pub field: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl ValidationError {
    /// Creates a validation error for the supplied field.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Start-up and registration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A tool with the same name is already registered.
    #[error("tool `{name}` is already registered")]
    DuplicateName {
        /// Name of the offending tool.
        name: String,
    },

    /// Capability pattern failed validation.
    #[error("invalid capability pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Signing secret is shorter than the enforced minimum.
    #[error("signing secret must be at least {min} bytes, got {actual}")]
    WeakSecret {
        /// Minimum accepted length in bytes.
        min: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// Signing secret was not supplied.
    #[error("signing secret `{key}` is not configured")]
    MissingSecret {
        /// Configuration key that was looked up.
        key: String,
    },

    /// The process-wide codec was already installed.
    #[error("signing secret already installed for this process")]
    SecretAlreadyInstalled,

    /// Tool name failed validation.
    #[error("invalid tool name `{name}`: {reason}")]
    InvalidToolName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Neither a short description nor documentation was supplied.
    #[error("tool `{name}` needs a short description or documentation")]
    MissingDescription {
        /// Name of the tool being registered.
        name: String,
    },

    /// Tool schema definition is inconsistent.
    #[error("invalid schema for tool `{name}`: {reason}")]
    InvalidSchema {
        /// Name of the tool being registered.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Principal identifier failed validation.
    #[error("invalid principal id: {reason}")]
    InvalidPrincipal {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Configuration value could not be parsed.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// Failures raised by or around a tool handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler reported a failure.
    #[error("tool failed: {message}")]
    Failed {
        /// Message supplied by the handler.
        message: String,
    },
    /// The handler did not finish before the deadline.
    #[error("tool timed out")]
    Timeout,
    /// The caller cancelled the call.
    #[error("tool call cancelled")]
    Cancelled,
}

impl HandlerError {
    /// Creates a handler failure carrying the supplied message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Umbrella error returned by discovery and invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Token or meta-capability failure.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Tool unknown or not visible to the caller.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    /// Arguments rejected by the tool schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Handler failure, timeout, or cancellation.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl GatewayError {
    /// Machine-readable code suitable for wire responses.
    ///
    /// All authentication failures share one code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::InsufficientCapability) => "forbidden",
            Self::Auth(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "invalid_arguments",
            Self::Handler(HandlerError::Failed { .. }) => "handler_failed",
            Self::Handler(HandlerError::Timeout) => "timeout",
            Self::Handler(HandlerError::Cancelled) => "cancelled",
        }
    }

    /// Message safe to return to an untrusted caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::InsufficientCapability) => "insufficient capability".into(),
            Self::Auth(_) => "invalid or expired token".into(),
            other => other.to_string(),
        }
    }
}
