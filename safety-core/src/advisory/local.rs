//! Deterministic rule-based advisories.
//!
//! Used when the remote model is throttled or slow, and directly from the
//! CLI with `advise --local`. Tiers reuse the classifier thresholds and add
//! an imminent-failure tier driven by temperature and the countdown.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Advisory, AdvisoryError, AdvisoryInput, AdvisoryProvider};
use crate::classifier::{classify, SeverityLevel, CRITICAL_TEMPERATURE};

/// Countdown (seconds) below which failure is treated as imminent.
pub const IMMINENT_TIME_LEFT: f64 = 100.0;

/// Which block of the rule table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryTier {
    Stable,
    Warning,
    Imminent,
}

impl AdvisoryTier {
    pub fn of(input: &AdvisoryInput) -> Self {
        if input.temperature > CRITICAL_TEMPERATURE || input.time_left < IMMINENT_TIME_LEFT {
            return Self::Imminent;
        }
        match classify(input.temperature, input.gas_level) {
            SeverityLevel::Critical => Self::Imminent,
            SeverityLevel::Warning => Self::Warning,
            SeverityLevel::Stable => Self::Stable,
        }
    }

    pub fn advisory(self) -> Advisory {
        match self {
            Self::Imminent => Advisory::new(
                "Explosion risk (local)",
                "Evacuate the area immediately and engage emergency cooling. \
                 Thermal runaway is imminent.",
                "Probable chemical failure in under two minutes.",
            ),
            Self::Warning => Advisory::new(
                "Critical warning (local)",
                "Cut the power source now and check for gas leaks. \
                 Do not open the cabinet by hand.",
                "Condition is degrading at an accelerating rate.",
            ),
            Self::Stable => Advisory::new(
                "Stable (local)",
                "Keep monitoring. All indicators are within the permitted operating range.",
                "Remaining battery life is stable.",
            ),
        }
    }
}

/// Rule-table provider. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRuleProvider;

impl LocalRuleProvider {
    pub const NAME: &'static str = "local-rules";

    pub fn new() -> Self {
        Self
    }

    pub fn analyse(&self, input: &AdvisoryInput) -> Advisory {
        AdvisoryTier::of(input).advisory()
    }
}

#[async_trait]
impl AdvisoryProvider for LocalRuleProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn advise(&self, input: &AdvisoryInput) -> Result<Advisory, AdvisoryError> {
        Ok(self.analyse(input))
    }
}
