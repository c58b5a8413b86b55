//! Advisory error taxonomy with fallback classification.
//!
//! Callers decide what to show with `category()` rather than string matching.
//!
//! | Category | Variants                              | Substitute            |
//! |----------|---------------------------------------|-----------------------|
//! | Quota    | RateLimited, Timeout                  | local rule advisory   |
//! | Other    | MissingApiKey, RequestFailed, Parse   | generic failure text  |
//! | Rejected | Busy                                  | none (nothing ran)    |
//!
//! No category is retried automatically; the operator re-triggers.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Classification used to pick the substitute advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Provider is throttling or too slow; local rules stand in.
    Quota,
    /// Provider is broken or misconfigured; show the generic failure triplet.
    Other,
    /// The request never started.
    Rejected,
}

impl FailureCategory {
    pub fn uses_local_fallback(self) -> bool {
        self == Self::Quota
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quota => write!(f, "quota"),
            Self::Other => write!(f, "other"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Errors from advisory providers and the advisory service.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// HTTP 429 or a `RESOURCE_EXHAUSTED` status from the provider.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Advisory timed out after {0:?}")]
    Timeout(Duration),

    #[error("API key not configured for {0}")]
    MissingApiKey(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    /// Another advisory request is still outstanding.
    #[error("An advisory request is already in flight")]
    Busy,
}

impl AdvisoryError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::RateLimited(_) | Self::Timeout(_) => FailureCategory::Quota,
            Self::MissingApiKey(_) | Self::RequestFailed(_) | Self::ParseError(_) => {
                FailureCategory::Other
            }
            Self::Busy => FailureCategory::Rejected,
        }
    }

    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            Self::RateLimited(format!("status {status}"))
        } else {
            Self::RequestFailed(format!("status {status}: {body}"))
        }
    }
}
