//! Symmetric signing secret.

use std::fmt;

use capgate_primitives::{ConfigError, ConfigResult};
use zeroize::Zeroizing;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Key material used to sign and verify tokens. Wiped from memory on drop.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Wraps raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WeakSecret`] when fewer than [`MIN_SECRET_LEN`]
    /// bytes are supplied.
    pub fn new(bytes: impl Into<Vec<u8>>) -> ConfigResult<Self> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_secret() {
        let err = SigningSecret::new("short").expect_err("weak");
        assert_eq!(
            err,
            ConfigError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: 5
            }
        );
    }

    #[test]
    fn debug_redacts_material() {
        let secret = SigningSecret::new(vec![7u8; 32]).unwrap();
        assert_eq!(format!("{secret:?}"), "SigningSecret([REDACTED])");
    }
}
