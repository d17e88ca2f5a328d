//! Server metadata returned by `server.describe`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Human-readable description of a gateway instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerManifest {
    name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ServerManifest {
    /// Starts building a [`ServerManifest`].
    #[must_use]
    pub fn builder() -> ServerManifestBuilder {
        ServerManifestBuilder {
            name: None,
            version: None,
            description: None,
        }
    }

    /// Returns the server display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Builder for [`ServerManifest`].
#[derive(Debug)]
pub struct ServerManifestBuilder {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
}

impl ServerManifestBuilder {
    /// Sets the server name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the name is empty.
    pub fn name(mut self, name: impl Into<String>) -> ConfigResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "server.name".into(),
                reason: "server name cannot be empty".into(),
            });
        }
        self.name = Some(name);
        Ok(self)
    }

    /// Sets the version string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the version is empty.
    pub fn version(mut self, version: impl Into<String>) -> ConfigResult<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "server.version".into(),
                reason: "server version cannot be empty".into(),
            });
        }
        self.version = Some(version);
        Ok(self)
    }

    /// Sets an optional description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Consumes the builder and returns the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the name is missing. A missing
    /// version defaults to this crate's version.
    pub fn build(self) -> ConfigResult<ServerManifest> {
        let name = self.name.ok_or_else(|| ConfigError::InvalidValue {
            key: "server.name".into(),
            reason: "server name must be provided".into(),
        })?;

        Ok(ServerManifest {
            name,
            version: self
                .version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_owned()),
            description: self.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_manifest() {
        let manifest = ServerManifest::builder()
            .name("demo")
            .unwrap()
            .version("1.2.3")
            .unwrap()
            .description("demo gateway")
            .build()
            .unwrap();

        assert_eq!(manifest.name(), "demo");
        assert_eq!(manifest.version(), "1.2.3");
        assert_eq!(manifest.description(), Some("demo gateway"));
    }

    #[test]
    fn name_is_required() {
        assert!(ServerManifest::builder().build().is_err());
    }
}
