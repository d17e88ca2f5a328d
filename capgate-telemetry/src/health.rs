//! Health reporting.

use serde::{Deserialize, Serialize};

/// Body returned by the unauthenticated health probe.
///
/// Carries liveness only; server identity stays behind `server.describe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always true while the process can answer.
    pub ok: bool,
}

impl HealthReport {
    /// Reports a healthy server.
    #[must_use]
    pub const fn healthy() -> Self {
        Self { ok: true }
    }
}
