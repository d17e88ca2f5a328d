//! Access decisions returned by the authorizer.

use serde::{Deserialize, Serialize};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Caller may proceed.
    Allow,
    /// Caller is refused.
    Deny,
}

/// Why a request was denied. Kept for logs and audit only; callers see the
/// collapsed wire error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DenyReason {
    /// The token lacks the meta-capability for the operation.
    MissingMetaCapability {
        /// Capability that was required.
        required: String,
    },
    /// The token does not cover every capability the tool requires.
    MissingToolCapability {
        /// Required capabilities left uncovered.
        missing: Vec<String>,
    },
}

/// Structured decision emitted by [`crate::CapabilityAuthorizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
}

impl AccessDecision {
    /// Returns an allow decision.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason: None,
        }
    }

    /// Returns a deny decision carrying `reason`.
    #[must_use]
    pub const fn deny(reason: DenyReason) -> Self {
        Self {
            kind: DecisionKind::Deny,
            reason: Some(reason),
        }
    }

    /// Returns the decision kind.
    #[must_use]
    pub const fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Returns true when the caller may proceed.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.kind == DecisionKind::Allow
    }

    /// Returns true when the caller is refused.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.kind == DecisionKind::Deny
    }

    /// Returns the deny reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&DenyReason> {
        self.reason.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_helpers_work() {
        let allow = AccessDecision::allow();
        assert!(allow.is_allow());
        assert!(!allow.is_deny());
        assert!(allow.reason().is_none());

        let deny = AccessDecision::deny(DenyReason::MissingMetaCapability {
            required: "tools:call".into(),
        });
        assert!(deny.is_deny());
        assert_eq!(deny.kind(), DecisionKind::Deny);
    }

    #[test]
    fn serializes_reason_tag() {
        let deny = AccessDecision::deny(DenyReason::MissingToolCapability {
            missing: vec!["tool:secret:read".into()],
        });
        let json = serde_json::to_value(&deny).unwrap();
        assert_eq!(json["kind"], "deny");
        assert_eq!(json["reason"]["type"], "missing_tool_capability");
        assert_eq!(json["reason"]["missing"][0], "tool:secret:read");
    }
}
