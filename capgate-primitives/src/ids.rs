//! Principal and call identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};

const MAX_PRINCIPAL_LEN: usize = 128;

/// Identity a capability token claims to represent.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal identifier after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPrincipal`] when the identifier is blank,
    /// too long, or contains control characters.
    pub fn new(id: impl Into<String>) -> ConfigResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::InvalidPrincipal {
                reason: "principal id cannot be empty".into(),
            });
        }
        if id.len() > MAX_PRINCIPAL_LEN {
            return Err(ConfigError::InvalidPrincipal {
                reason: format!("principal id length must be <= {MAX_PRINCIPAL_LEN}"),
            });
        }
        if id.chars().any(char::is_control) {
            return Err(ConfigError::InvalidPrincipal {
                reason: "principal id cannot contain control characters".into(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

/// Correlation identifier assigned to each tool call.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a random call identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for CallId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for CallId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}
