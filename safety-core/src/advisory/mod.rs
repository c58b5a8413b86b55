//! Safety advisory capability.
//!
//! An advisory turns four telemetry figures into a three-part piece of
//! operator guidance. Any [`AdvisoryProvider`] can produce one; the monitor
//! runs a remote generative model first and substitutes [`LocalRuleProvider`]
//! according to [`fallback_for`] when it fails.

pub mod errors;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::resilience::DegradedResponse;
use crate::state::{TelemetrySnapshot, TelemetryState};

pub use errors::{AdvisoryError, FailureCategory};
pub use local::{AdvisoryTier, LocalRuleProvider};

/// Confidence attached to advisories served by the local rule table.
pub const LOCAL_FALLBACK_CONFIDENCE: f64 = 0.6;

/// Risk / recommendation / prediction guidance triplet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advisory {
    /// Short technical status.
    pub risk_level: String,
    /// Direct order for the operator.
    pub recommendation: String,
    /// Time-based damage forecast.
    pub prediction: String,
}

impl Advisory {
    pub fn new(
        risk_level: impl Into<String>,
        recommendation: impl Into<String>,
        prediction: impl Into<String>,
    ) -> Self {
        Self {
            risk_level: risk_level.into(),
            recommendation: recommendation.into(),
            prediction: prediction.into(),
        }
    }

    /// Generic triplet shown when no provider could answer.
    pub fn analysis_failed() -> Self {
        Self::new(
            "Analysis failed",
            "Check the system's technical error log and restart the monitor.",
            "Data is currently unavailable.",
        )
    }
}

/// Figures an advisory is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryInput {
    pub temperature: f64,
    pub gas_level: f64,
    pub stability_percent: f64,
    pub time_left: f64,
}

impl AdvisoryInput {
    pub fn from_state(state: &TelemetryState) -> Self {
        Self {
            temperature: state.temperature,
            gas_level: state.gas_level,
            stability_percent: state.stability_percent(),
            time_left: state.time_left,
        }
    }

    /// One-line telemetry summary used as the model prompt body.
    pub fn telemetry_line(&self) -> String {
        format!(
            "TELEMETRY: Temp {:.1}C, Gas {:.1}%, Stability {:.1}%, Countdown {:.1}s.",
            self.temperature, self.gas_level, self.stability_percent, self.time_left
        )
    }
}

impl From<&TelemetrySnapshot> for AdvisoryInput {
    fn from(snapshot: &TelemetrySnapshot) -> Self {
        Self {
            temperature: snapshot.temperature,
            gas_level: snapshot.gas_level,
            stability_percent: snapshot.stability_percent,
            time_left: snapshot.time_left,
        }
    }
}

/// Anything that can turn telemetry into an [`Advisory`].
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    /// Provider name for logging and `served_by`.
    fn name(&self) -> &'static str;

    async fn advise(&self, input: &AdvisoryInput) -> Result<Advisory, AdvisoryError>;
}

/// Substitute response for a failed provider call.
///
/// Returns `None` for rejected requests, which never ran and so have nothing
/// to substitute.
pub fn fallback_for(
    error: &AdvisoryError,
    input: &AdvisoryInput,
) -> Option<DegradedResponse<Advisory>> {
    match error.category() {
        FailureCategory::Quota => Some(DegradedResponse::partial(
            LocalRuleProvider::new().analyse(input),
            LocalRuleProvider::NAME,
            LOCAL_FALLBACK_CONFIDENCE,
            &format!("remote advisory unavailable ({error}); using local rules"),
        )),
        FailureCategory::Other => Some(DegradedResponse::unavailable(
            Advisory::analysis_failed(),
            &error.to_string(),
        )),
        FailureCategory::Rejected => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resilience::DegradationLevel;

    fn hot_input() -> AdvisoryInput {
        AdvisoryInput::from_state(&TelemetryState::new(90.0, 20.0, 400.0))
    }

    #[test]
    fn input_mirrors_state() {
        let state = TelemetryState::new(40.0, 12.0, 300.0);
        let input = AdvisoryInput::from_state(&state);
        assert_eq!(input.stability_percent, 50.0);
        assert_eq!(input, AdvisoryInput::from(&state.snapshot()));
    }

    #[test]
    fn telemetry_line_uses_one_decimal() {
        let input = AdvisoryInput::from_state(&TelemetryState::initial());
        assert_eq!(
            input.telemetry_line(),
            "TELEMETRY: Temp 24.5C, Gas 5.2%, Stability 100.0%, Countdown 600.0s."
        );
    }

    #[test]
    fn quota_error_falls_back_to_local_rules() {
        let err = AdvisoryError::RateLimited("429".into());
        let resp = fallback_for(&err, &hot_input()).unwrap();
        assert_eq!(resp.level, DegradationLevel::Partial);
        assert_eq!(resp.served_by, LocalRuleProvider::NAME);
        assert_eq!(resp.payload, LocalRuleProvider::new().analyse(&hot_input()));
    }

    #[test]
    fn timeout_falls_back_to_local_rules() {
        let err = AdvisoryError::Timeout(Duration::from_secs(1));
        let resp = fallback_for(&err, &hot_input()).unwrap();
        assert_eq!(resp.level, DegradationLevel::Partial);
    }

    #[test]
    fn other_error_yields_generic_failure() {
        let err = AdvisoryError::ParseError("not json".into());
        let resp = fallback_for(&err, &hot_input()).unwrap();
        assert_eq!(resp.level, DegradationLevel::Unavailable);
        assert_eq!(resp.payload, Advisory::analysis_failed());
    }

    #[test]
    fn busy_has_no_substitute() {
        assert!(fallback_for(&AdvisoryError::Busy, &hot_input()).is_none());
    }

    #[test]
    fn advisory_serializes_camel_case() {
        let json = serde_json::to_string(&Advisory::analysis_failed()).unwrap();
        assert!(json.contains("\"riskLevel\""));
        assert!(json.contains("\"recommendation\""));
        assert!(json.contains("\"prediction\""));
    }
}
