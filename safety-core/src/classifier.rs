//! Threshold classification of the current readings.
//!
//! Tiers are checked from most to least severe and the first match wins.
//! Within a tier either reading alone is enough. Comparisons are strict and
//! there is no hysteresis: a reading hovering on a threshold flips level on
//! every recomputation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Temperature above which the cabinet is critical (°C).
pub const CRITICAL_TEMPERATURE: f64 = 85.0;
/// Gas concentration above which the cabinet is critical (%).
pub const CRITICAL_GAS: f64 = 75.0;
/// Temperature above which the cabinet is in warning (°C).
pub const WARNING_TEMPERATURE: f64 = 50.0;
/// Gas concentration above which the cabinet is in warning (%).
pub const WARNING_GAS: f64 = 40.0;

/// Ordered severity of the current readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    #[default]
    Stable,
    Warning,
    Critical,
}

impl SeverityLevel {
    pub fn is_critical(self) -> bool {
        self == Self::Critical
    }

    /// Operator-facing alarm label.
    pub fn alarm_label(self) -> &'static str {
        match self {
            Self::Stable => "System stable",
            Self::Warning => "System warning",
            Self::Critical => "Extreme critical danger",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "STABLE"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Classify a temperature / gas pair.
pub fn classify(temperature: f64, gas_level: f64) -> SeverityLevel {
    if temperature > CRITICAL_TEMPERATURE || gas_level > CRITICAL_GAS {
        SeverityLevel::Critical
    } else if temperature > WARNING_TEMPERATURE || gas_level > WARNING_GAS {
        SeverityLevel::Warning
    } else {
        SeverityLevel::Stable
    }
}
