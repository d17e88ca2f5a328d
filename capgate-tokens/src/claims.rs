//! Decoded token contents.

use std::collections::BTreeSet;

use capgate_primitives::{CapabilityPattern, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verified contents of a capability token.
///
/// Field order is part of the signed encoding; capabilities are kept sorted so
/// equal claim sets always serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    principal_id: PrincipalId,
    capabilities: BTreeSet<CapabilityPattern>,
    expires_at: i64,
}

impl TokenClaims {
    /// Assembles claims from already-validated parts.
    #[must_use]
    pub fn new(
        principal_id: PrincipalId,
        capabilities: BTreeSet<CapabilityPattern>,
        expires_at: i64,
    ) -> Self {
        Self {
            principal_id,
            capabilities,
            expires_at,
        }
    }

    /// Returns the principal the token speaks for.
    #[must_use]
    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    /// Returns the granted capability patterns.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<CapabilityPattern> {
        &self.capabilities
    }

    /// Returns the expiry as seconds since the Unix epoch.
    #[must_use]
    pub const fn expires_at_unix(&self) -> i64 {
        self.expires_at
    }

    /// Returns the expiry as a UTC timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or_default()
    }

    /// Returns true once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }

    /// Returns true if every pattern in `required` is covered by the grant.
    #[must_use]
    pub fn satisfies<'a, R>(&'a self, required: R) -> bool
    where
        R: IntoIterator<Item = &'a CapabilityPattern>,
    {
        capgate_primitives::satisfies(&self.capabilities, required)
    }
}
