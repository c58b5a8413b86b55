//! View models for the presentation layer.
//!
//! Everything here is derived from a [`TelemetrySnapshot`]; nothing renders.
//! A terminal front end and a web front end read the same values.

use serde::{Deserialize, Serialize};

use crate::classifier::SeverityLevel;
use crate::state::{SensorChannel, TelemetrySnapshot, MAX_STABILITY_TIME};

/// Surface temperature above which the countdown panel is shown as active
/// even outside critical mode (°C).
pub const COUNTDOWN_ACTIVE_TEMPERATURE: f64 = 35.0;

// ── Gauges ───────────────────────────────────────────────────────────

/// Colour band of a 0–100 gauge, split into equal thirds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeZone {
    Green,
    Amber,
    Red,
}

impl GaugeZone {
    pub fn of(value: f64) -> Self {
        let v = value.clamp(0.0, 100.0);
        if v < 100.0 / 3.0 {
            Self::Green
        } else if v < 200.0 / 3.0 {
            Self::Amber
        } else {
            Self::Red
        }
    }
}

impl std::fmt::Display for GaugeZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => write!(f, "green"),
            Self::Amber => write!(f, "amber"),
            Self::Red => write!(f, "red"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReading {
    pub label: String,
    pub unit: &'static str,
    pub value: f64,
    /// Needle angle in degrees, -90 (empty) to +90 (full scale).
    pub needle_degrees: f64,
    pub zone: GaugeZone,
}

impl GaugeReading {
    pub fn new(label: impl Into<String>, unit: &'static str, value: f64) -> Self {
        let clamped = value.clamp(0.0, 100.0);
        Self {
            label: label.into(),
            unit,
            value,
            needle_degrees: clamped / 100.0 * 180.0 - 90.0,
            zone: GaugeZone::of(value),
        }
    }
}

/// Main gauges: gas first, then surface temperature.
pub fn primary_gauges(snapshot: &TelemetrySnapshot) -> [GaugeReading; 2] {
    [
        GaugeReading::new("Gas density (H2/CO)", "%", snapshot.gas_level),
        GaugeReading::new("Surface temperature", "°C", snapshot.temperature),
    ]
}

/// One compact gauge per sensor channel, in channel order.
pub fn sensor_gauges(snapshot: &TelemetrySnapshot) -> Vec<GaugeReading> {
    SensorChannel::ALL
        .iter()
        .filter_map(|channel| {
            snapshot
                .sensors
                .get(channel)
                .map(|reading| GaugeReading::new(channel.label(), channel.unit(), reading.value))
        })
        .collect()
}

// ── Countdown ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownStatus {
    /// Readings are within safe limits; panel idles.
    Standby,
    ActiveDecay,
    /// Less than 20% of the countdown remains.
    Extreme,
    /// Countdown exhausted.
    Failure,
}

/// Thermal stability countdown panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownView {
    /// Whole seconds remaining.
    pub seconds_left: u32,
    pub percent: f64,
    pub is_active: bool,
    pub status: CountdownStatus,
    pub progress_zone: GaugeZone,
}

impl CountdownView {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, critical_mode: bool) -> Self {
        let seconds_left = snapshot.time_left.max(0.0).floor() as u32;
        let percent = f64::from(seconds_left) / MAX_STABILITY_TIME * 100.0;
        let is_active = critical_mode || snapshot.temperature > COUNTDOWN_ACTIVE_TEMPERATURE;

        let status = if !is_active {
            CountdownStatus::Standby
        } else if seconds_left == 0 {
            CountdownStatus::Failure
        } else if percent < 20.0 {
            CountdownStatus::Extreme
        } else {
            CountdownStatus::ActiveDecay
        };

        let progress_zone = if percent > 60.0 {
            GaugeZone::Green
        } else if percent > 20.0 {
            GaugeZone::Amber
        } else {
            GaugeZone::Red
        };

        Self {
            seconds_left,
            percent,
            is_active,
            status,
            progress_zone,
        }
    }

    /// Headline text: `MONITORING...`, `FAILURE` or `Xm Ys`.
    pub fn headline(&self) -> String {
        match self.status {
            CountdownStatus::Standby => "MONITORING...".to_string(),
            CountdownStatus::Failure => "FAILURE".to_string(),
            _ => format!("{}m {}s", self.seconds_left / 60, self.seconds_left % 60),
        }
    }
}

// ── Alarm ────────────────────────────────────────────────────────────

/// Alarm panel state for a severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlarmView {
    pub severity: SeverityLevel,
    pub label: &'static str,
    /// Siren is sounding (critical and not muted).
    pub sounding: bool,
}

impl AlarmView {
    pub fn new(severity: SeverityLevel, muted: bool) -> Self {
        Self {
            severity,
            label: severity.alarm_label(),
            sounding: severity.is_critical() && !muted,
        }
    }
}
