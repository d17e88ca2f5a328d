//! Capability patterns and the segment matcher.
//!
//! A pattern is a sequence of segments separated by `:` or `.`; both
//! separators are equivalent, so `tool:math.add` and `tool:math:add` name the
//! same capability. A final `*` segment matches zero or more trailing segments.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

const MAX_PATTERN_LEN: usize = 256;
const WILDCARD: &str = "*";

/// Meta-capabilities understood by the protocol itself.
pub mod meta {
    /// Grants `tools.list`.
    pub const TOOLS_LIST: &str = "tools:list";
    /// Grants `tools.get`.
    pub const TOOLS_GET: &str = "tools:get";
    /// Grants `tools.call`.
    pub const TOOLS_CALL: &str = "tools:call";
    /// Grants `server.describe`.
    pub const SERVER_DESCRIBE: &str = "server:describe";
}

/// Validated capability pattern.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityPattern(String);

impl CapabilityPattern {
    /// Parses and validates a capability pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when the pattern is empty, too
    /// long, contains an empty segment or whitespace, or uses `*` anywhere
    /// other than as the whole final segment.
    pub fn parse(pattern: impl Into<String>) -> ConfigResult<Self> {
        let pattern = pattern.into();
        validate_pattern(&pattern)?;
        Ok(Self(pattern))
    }

    /// Parses a pattern that must not contain a wildcard.
    ///
    /// Tool requirements are always concrete; only grants may be broad.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for malformed or wildcard patterns.
    pub fn concrete(pattern: impl Into<String>) -> ConfigResult<Self> {
        let parsed = Self::parse(pattern)?;
        if parsed.is_wildcard() {
            return Err(ConfigError::InvalidPattern {
                pattern: parsed.0,
                reason: "required capabilities cannot contain wildcards".into(),
            });
        }
        Ok(parsed)
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the pattern's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        split_segments(&self.0)
    }

    /// Returns true when the pattern ends in a wildcard segment.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.segments().last() == Some(WILDCARD)
    }
}

impl Display for CapabilityPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CapabilityPattern {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for CapabilityPattern {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CapabilityPattern> for String {
    fn from(value: CapabilityPattern) -> Self {
        value.0
    }
}

impl AsRef<str> for CapabilityPattern {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn split_segments(pattern: &str) -> impl Iterator<Item = &str> {
    pattern.split([':', '.'])
}

fn validate_pattern(pattern: &str) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: reason.to_owned(),
    };

    if pattern.is_empty() {
        return Err(invalid("pattern cannot be empty"));
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(invalid(&format!(
            "pattern length must be <= {MAX_PATTERN_LEN}"
        )));
    }
    if pattern.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("pattern cannot contain whitespace"));
    }

    let segments: Vec<&str> = split_segments(pattern).collect();
    let last = segments.len() - 1;
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(invalid("pattern cannot contain empty segments"));
        }
        if segment.contains('*') && (*segment != WILDCARD || index != last) {
            return Err(invalid("wildcard must be the whole final segment"));
        }
    }

    Ok(())
}

/// Returns true when `pattern` covers `candidate`.
///
/// Segments are compared positionally and case-sensitively. A trailing `*`
/// in `pattern` absorbs any remaining candidate segments, including none.
/// Candidates are concrete: a candidate carrying a wildcard never matches.
#[must_use]
pub fn matches(pattern: &CapabilityPattern, candidate: &CapabilityPattern) -> bool {
    if candidate.is_wildcard() {
        return false;
    }

    let mut wanted = pattern.segments();
    let mut offered = candidate.segments();
    loop {
        match (wanted.next(), offered.next()) {
            (Some(WILDCARD), _) => return true,
            (Some(w), Some(o)) if w == o => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Returns true when every required pattern is covered by some granted pattern.
///
/// An empty requirement set is always satisfied.
#[must_use]
pub fn satisfies<'a, G, R>(granted: G, required: R) -> bool
where
    G: IntoIterator<Item = &'a CapabilityPattern> + Clone,
    R: IntoIterator<Item = &'a CapabilityPattern>,
{
    required.into_iter().all(|needed| {
        granted
            .clone()
            .into_iter()
            .any(|grant| matches(grant, needed))
    })
}
