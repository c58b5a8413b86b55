//! Advisory service levels.
//!
//! The display layer never sees an advisory error. Whatever path answered,
//! it receives a [`DegradedResponse`] carrying an [`Advisory`]-shaped payload
//! plus a note of how trustworthy that payload is:
//!
//! | path                          | level         | confidence |
//! |-------------------------------|---------------|------------|
//! | remote model answered         | `Full`        | 1.0        |
//! | quota or deadline, local rules| `Partial`     | caller set |
//! | anything else                 | `Unavailable` | 0.0        |
//!
//! [`Advisory`]: crate::advisory::Advisory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name recorded as `served_by` when no provider produced the payload.
pub const NO_PROVIDER: &str = "none";

/// Service level of one advisory. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    Full,
    Partial,
    Unavailable,
}

impl DegradationLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A payload tagged with the service level that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedResponse<T> {
    pub payload: T,
    pub level: DegradationLevel,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Provider name, or [`NO_PROVIDER`].
    pub served_by: String,
    /// Why the response is degraded; empty at `Full`.
    pub warnings: Vec<String>,
    pub produced_at: DateTime<Utc>,
}

impl<T> DegradedResponse<T> {
    fn tagged(
        payload: T,
        level: DegradationLevel,
        confidence: f64,
        served_by: &str,
        warning: Option<&str>,
    ) -> Self {
        Self {
            payload,
            level,
            confidence: confidence.clamp(0.0, 1.0),
            served_by: served_by.to_owned(),
            warnings: warning.map(str::to_owned).into_iter().collect(),
            produced_at: Utc::now(),
        }
    }

    /// The primary provider answered.
    pub fn full(payload: T, served_by: &str) -> Self {
        Self::tagged(payload, DegradationLevel::Full, 1.0, served_by, None)
    }

    /// A fallback answered in place of the primary.
    pub fn partial(payload: T, served_by: &str, confidence: f64, warning: &str) -> Self {
        Self::tagged(
            payload,
            DegradationLevel::Partial,
            confidence,
            served_by,
            Some(warning),
        )
    }

    /// Nobody answered; `payload` is a placeholder.
    pub fn unavailable(payload: T, warning: &str) -> Self {
        Self::tagged(
            payload,
            DegradationLevel::Unavailable,
            0.0,
            NO_PROVIDER,
            Some(warning),
        )
    }
}
