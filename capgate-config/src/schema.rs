//! Typed gateway configuration.

use std::time::Duration;

use capgate_primitives::{ConfigError, ConfigResult, ServerManifest};
use capgate_telemetry::{LogFormat, TelemetryConfig};
use capgate_tokens::{SigningSecret, TokenCodec};
use tracing::info;

use crate::loader::{ConfigSource, EnvSource};

/// Configuration keys.
pub mod keys {
    /// Symmetric signing secret, at least 32 bytes. Required.
    pub const SIGNING_SECRET: &str = "CAPGATE_SIGNING_SECRET";
    /// Default token lifetime in seconds.
    pub const DEFAULT_TTL_SECS: &str = "CAPGATE_DEFAULT_TTL_SECS";
    /// Default handler timeout in milliseconds; `0` disables it.
    pub const CALL_TIMEOUT_MS: &str = "CAPGATE_CALL_TIMEOUT_MS";
    /// Log filter directive.
    pub const LOG: &str = "CAPGATE_LOG";
    /// Log format, `text` or `json`.
    pub const LOG_FORMAT: &str = "CAPGATE_LOG_FORMAT";
    /// Name reported by `server.describe`.
    pub const SERVER_NAME: &str = "CAPGATE_SERVER_NAME";
    /// Description reported by `server.describe`.
    pub const SERVER_DESCRIPTION: &str = "CAPGATE_SERVER_DESCRIPTION";
}

const DEFAULT_TTL_SECS: i64 = 3600;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SERVER_NAME: &str = "capgate";

/// Settings read once at start-up.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    signing_secret: SigningSecret,
    default_ttl: chrono::Duration,
    call_timeout: Option<Duration>,
    telemetry: TelemetryConfig,
    server_name: String,
    server_description: Option<String>,
}

impl GatewayConfig {
    /// Loads configuration from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecret`] or [`ConfigError::WeakSecret`]
    /// for an absent or short secret, and [`ConfigError::InvalidValue`] for
    /// unparseable optional values.
    pub fn load(source: &dyn ConfigSource) -> ConfigResult<Self> {
        let secret = non_blank(source, keys::SIGNING_SECRET).ok_or_else(|| {
            ConfigError::MissingSecret {
                key: keys::SIGNING_SECRET.to_owned(),
            }
        })?;
        let signing_secret = SigningSecret::new(secret.into_bytes())?;

        let ttl_secs = parse_or(source, keys::DEFAULT_TTL_SECS, DEFAULT_TTL_SECS)?;
        if ttl_secs <= 0 {
            return Err(invalid(keys::DEFAULT_TTL_SECS, "must be positive"));
        }

        let timeout_ms = parse_or(source, keys::CALL_TIMEOUT_MS, DEFAULT_CALL_TIMEOUT_MS)?;
        let call_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let mut telemetry = TelemetryConfig::default();
        if let Some(filter) = non_blank(source, keys::LOG) {
            telemetry = telemetry.with_filter(filter);
        }
        if let Some(format) = non_blank(source, keys::LOG_FORMAT) {
            let format: LogFormat = format
                .parse()
                .map_err(|err: capgate_telemetry::TelemetryError| {
                    invalid(keys::LOG_FORMAT, &err.to_string())
                })?;
            telemetry = telemetry.with_format(format);
        }

        let config = Self {
            signing_secret,
            default_ttl: chrono::Duration::seconds(ttl_secs),
            call_timeout,
            telemetry,
            server_name: non_blank(source, keys::SERVER_NAME)
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_owned()),
            server_description: non_blank(source, keys::SERVER_DESCRIPTION),
        };
        info!(
            server = %config.server_name,
            default_ttl_secs = ttl_secs,
            call_timeout_ms = timeout_ms,
            "gateway configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`GatewayConfig::load`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::load(&EnvSource::new())
    }

    /// Returns the signing secret.
    #[must_use]
    pub fn signing_secret(&self) -> &SigningSecret {
        &self.signing_secret
    }

    /// Builds a codec keyed with the configured secret.
    #[must_use]
    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(self.signing_secret.clone())
    }

    /// Returns the lifetime given to tokens minted without an explicit TTL.
    #[must_use]
    pub const fn default_ttl(&self) -> chrono::Duration {
        self.default_ttl
    }

    /// Returns the default handler timeout, if enabled.
    #[must_use]
    pub const fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Returns the logging configuration.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }

    /// Builds the manifest reported by `server.describe`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the manifest is rejected.
    pub fn manifest(&self) -> ConfigResult<ServerManifest> {
        let mut builder = ServerManifest::builder().name(self.server_name.clone())?;
        if let Some(description) = &self.server_description {
            builder = builder.description(description.clone());
        }
        builder.build()
    }
}

fn non_blank(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source.get(key).filter(|value| !value.trim().is_empty())
}

fn parse_or<T>(source: &dyn ConfigSource, key: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(source, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err: T::Err| invalid(key, &err.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        reason: reason.to_owned(),
    }
}
