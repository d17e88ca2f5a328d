//! Token minting and verification.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use capgate_primitives::{AuthError, CapabilityPattern, ConfigError, ConfigResult, PrincipalId};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::claims::TokenClaims;
use crate::clock::{Clock, SystemClock};
use crate::secret::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// Version of the signed byte layout. Bump when the payload encoding changes.
const SIGNING_DATA_VERSION: u8 = 0x01;

/// Upper bound on accepted token length, checked before any decoding.
pub const MAX_TOKEN_LEN: usize = 8 * 1024;

const SEGMENT_SEPARATOR: char = '.';

static GLOBAL_CODEC: OnceLock<Arc<TokenCodec>> = OnceLock::new();

/// Installs the process-wide codec. Succeeds at most once per process.
///
/// # Errors
///
/// Returns [`ConfigError::SecretAlreadyInstalled`] on any later call.
pub fn install_global(codec: TokenCodec) -> ConfigResult<Arc<TokenCodec>> {
    let codec = Arc::new(codec);
    GLOBAL_CODEC
        .set(Arc::clone(&codec))
        .map_err(|_| ConfigError::SecretAlreadyInstalled)?;
    Ok(codec)
}

/// Returns the process-wide codec, if one was installed.
#[must_use]
pub fn global() -> Option<Arc<TokenCodec>> {
    GLOBAL_CODEC.get().cloned()
}

/// Mints and verifies capability tokens under a single signing secret.
pub struct TokenCodec {
    secret: SigningSecret,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec that reads wall-clock time.
    #[must_use]
    pub fn new(secret: SigningSecret) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Creates a codec with a custom time source.
    #[must_use]
    pub fn with_clock(secret: SigningSecret, clock: Arc<dyn Clock>) -> Self {
        Self { secret, clock }
    }

    /// Returns the current time as seen by this codec.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Mints a token for `principal_id` granting `capabilities` for `ttl`.
    ///
    /// A negative `ttl` yields a token that is already expired.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPrincipal`] or [`ConfigError::InvalidPattern`]
    /// when the inputs fail validation.
    pub fn mint<I, S>(
        &self,
        principal_id: &str,
        capabilities: I,
        ttl: Duration,
    ) -> ConfigResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let principal_id = PrincipalId::new(principal_id)?;
        let capabilities = capabilities
            .into_iter()
            .map(CapabilityPattern::parse)
            .collect::<ConfigResult<BTreeSet<_>>>()?;

        let expires_at = self.clock.now().timestamp().saturating_add(ttl.num_seconds());
        let claims = TokenClaims::new(principal_id, capabilities, expires_at);
        let token = self.encode(&claims)?;

        debug!(
            principal = %claims.principal_id(),
            capabilities = claims.capabilities().len(),
            expires_at,
            "capability token minted"
        );
        Ok(token)
    }

    /// Signs already-validated claims.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the claims cannot be encoded.
    pub fn encode(&self, claims: &TokenClaims) -> ConfigResult<String> {
        let payload = serde_json::to_vec(claims).map_err(|err| ConfigError::InvalidValue {
            key: "token.claims".into(),
            reason: err.to_string(),
        })?;
        let mut mac = self.keyed_mac().map_err(|_| ConfigError::WeakSecret {
            min: crate::MIN_SECRET_LEN,
            actual: self.secret.expose().len(),
        })?;
        mac.update(&[SIGNING_DATA_VERSION]);
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}{SEGMENT_SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verifies a token and returns its claims.
    ///
    /// Checks run in order: structure, signature (constant time), payload
    /// decoding, expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`], [`AuthError::InvalidSignature`], or
    /// [`AuthError::Expired`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let result = self.verify_inner(token);
        if let Err(err) = &result {
            debug!(reason = err.reason_code(), "capability token rejected");
        }
        result
    }

    fn verify_inner(&self, token: &str) -> Result<TokenClaims, AuthError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::Malformed);
        }
        let (payload_segment, signature_segment) = token
            .split_once(SEGMENT_SEPARATOR)
            .ok_or(AuthError::Malformed)?;
        if payload_segment.is_empty()
            || signature_segment.is_empty()
            || signature_segment.contains(SEGMENT_SEPARATOR)
        {
            return Err(AuthError::Malformed);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_segment)
            .map_err(|_| AuthError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_segment)
            .map_err(|_| AuthError::Malformed)?;

        let mut mac = self.keyed_mac().map_err(|_| AuthError::InvalidSignature)?;
        mac.update(&[SIGNING_DATA_VERSION]);
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn keyed_mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(self.secret.expose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    const NOW: i64 = 1_700_000_000;

    fn secret(byte: u8) -> SigningSecret {
        SigningSecret::new(vec![byte; 32]).unwrap()
    }

    fn codec_with_clock() -> (TokenCodec, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at(DateTime::from_timestamp(NOW, 0).unwrap()));
        let codec = TokenCodec::with_clock(secret(1), Arc::clone(&clock) as Arc<dyn Clock>);
        (codec, clock)
    }

    #[test]
    fn mint_then_verify_round_trips() {
        let (codec, _) = codec_with_clock();
        let token = codec
            .mint("demo", ["tools:list", "tool:math:*"], Duration::seconds(3600))
            .unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.principal_id().as_str(), "demo");
        assert_eq!(claims.expires_at_unix(), NOW + 3600);
        let caps: Vec<&str> = claims.capabilities().iter().map(CapabilityPattern::as_str).collect();
        assert_eq!(caps, ["tool:math:*", "tools:list"]);
    }

    #[test]
    fn token_has_two_url_safe_segments() {
        let (codec, _) = codec_with_clock();
        let token = codec.mint("demo", ["tools:list"], Duration::seconds(60)).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 2);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        );
    }

    #[test]
    fn every_flipped_byte_is_rejected() {
        let (codec, _) = codec_with_clock();
        let token = codec.mint("demo", ["tools:call"], Duration::seconds(60)).unwrap();
        let bytes = token.as_bytes();

        for index in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[index] ^= 0x01;
            let tampered = String::from_utf8(tampered).unwrap();
            let err = codec.verify(&tampered).expect_err("tampered token verified");
            assert!(
                matches!(err, AuthError::InvalidSignature | AuthError::Malformed),
                "byte {index}: {err:?}"
            );
        }
    }

    #[test]
    fn negative_ttl_is_expired() {
        let (codec, _) = codec_with_clock();
        let token = codec.mint("demo", ["tools:list"], Duration::seconds(-1)).unwrap();
        assert_eq!(codec.verify(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn expires_when_clock_reaches_expiry() {
        let (codec, clock) = codec_with_clock();
        let token = codec.mint("demo", ["tools:list"], Duration::seconds(10)).unwrap();
        clock.advance(Duration::seconds(9));
        assert!(codec.verify(&token).is_ok());
        clock.advance(Duration::seconds(1));
        assert_eq!(codec.verify(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn different_secret_fails_signature() {
        let (codec, _) = codec_with_clock();
        let token = codec.mint("demo", ["tools:list"], Duration::seconds(60)).unwrap();
        let other = TokenCodec::new(secret(2));
        assert_eq!(other.verify(&token).unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn structural_garbage_is_malformed() {
        let (codec, _) = codec_with_clock();
        for bad in ["", "abc", ".abc", "abc.", "a.b.c", "!!!.???"] {
            assert_eq!(codec.verify(bad).unwrap_err(), AuthError::Malformed, "{bad}");
        }
        let oversized = "a".repeat(MAX_TOKEN_LEN + 1);
        assert_eq!(codec.verify(&oversized).unwrap_err(), AuthError::Malformed);
    }

    #[test]
    fn signed_garbage_payload_is_malformed() {
        let (codec, _) = codec_with_clock();
        let payload = b"not json";
        let mut mac = codec.keyed_mac().unwrap();
        mac.update(&[SIGNING_DATA_VERSION]);
        mac.update(payload);
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        );
        assert_eq!(codec.verify(&token).unwrap_err(), AuthError::Malformed);
    }

    #[test]
    fn mint_rejects_invalid_patterns() {
        let (codec, _) = codec_with_clock();
        let err = codec
            .mint("demo", ["tool:*:add"], Duration::seconds(60))
            .expect_err("invalid pattern");
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));

        let err = codec
            .mint(" ", ["tools:list"], Duration::seconds(60))
            .expect_err("blank principal");
        assert!(matches!(err, ConfigError::InvalidPrincipal { .. }));
    }

    #[test]
    fn equal_claims_encode_identically() {
        let (codec, _) = codec_with_clock();
        let a = codec
            .mint("demo", ["tools:get", "tools:list"], Duration::seconds(60))
            .unwrap();
        let b = codec
            .mint("demo", ["tools:list", "tools:get", "tools:list"], Duration::seconds(60))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn global_codec_installs_once() {
        let first = install_global(TokenCodec::new(secret(3)));
        let second = install_global(TokenCodec::new(secret(4)));
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), ConfigError::SecretAlreadyInstalled);
        assert!(global().is_some());
    }
}
