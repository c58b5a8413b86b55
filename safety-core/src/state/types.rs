use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::{classify, SeverityLevel};

/// Full-scale thermal stability countdown, in seconds.
pub const MAX_STABILITY_TIME: f64 = 600.0;

/// Lower bound of the surface temperature reading (°C).
pub const TEMPERATURE_MIN: f64 = 22.0;
/// Upper bound of the surface temperature reading (°C).
pub const TEMPERATURE_MAX: f64 = 100.0;
/// Lower bound of the gas concentration reading (%).
pub const GAS_MIN: f64 = 2.0;
/// Upper bound of the gas concentration reading (%).
pub const GAS_MAX: f64 = 100.0;

const INITIAL_TEMPERATURE: f64 = 24.5;
const INITIAL_GAS_LEVEL: f64 = 5.2;

// ── Sensors ──────────────────────────────────────────────────────────

/// One of the six fixed sensor channels on the battery cabinet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorChannel {
    /// Combined gas / humidity / pressure sensor.
    #[serde(rename = "BME680")]
    Bme680,
    /// Hydrogen sensor.
    #[serde(rename = "MQ8")]
    Mq8,
    /// Carbon monoxide sensor.
    #[serde(rename = "MQ7")]
    Mq7,
    /// Combustible gas / smoke sensor.
    #[serde(rename = "MQ2")]
    Mq2,
    /// Ambient temperature / humidity sensor.
    #[serde(rename = "DHT22")]
    Dht22,
    /// Contact temperature probe.
    #[serde(rename = "DS18B20")]
    Ds18b20,
}

impl SensorChannel {
    /// All channels in display order.
    pub const ALL: [SensorChannel; 6] = [
        SensorChannel::Bme680,
        SensorChannel::Mq8,
        SensorChannel::Mq7,
        SensorChannel::Mq2,
        SensorChannel::Dht22,
        SensorChannel::Ds18b20,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bme680 => "BME680",
            Self::Mq8 => "MQ8",
            Self::Mq7 => "MQ7",
            Self::Mq2 => "MQ2",
            Self::Dht22 => "DHT22",
            Self::Ds18b20 => "DS18B20",
        }
    }

    /// Display unit. Only the DHT channel reports in degrees.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Dht22 => "°C",
            _ => "%",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Static reading shown for a sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub active: bool,
    pub value: f64,
}

impl SensorReading {
    pub fn active(value: f64) -> Self {
        Self {
            active: true,
            value,
        }
    }
}

fn default_sensors() -> BTreeMap<SensorChannel, SensorReading> {
    BTreeMap::from([
        (SensorChannel::Bme680, SensorReading::active(0.1)),
        (SensorChannel::Mq8, SensorReading::active(0.5)),
        (SensorChannel::Mq7, SensorReading::active(0.3)),
        (SensorChannel::Mq2, SensorReading::active(0.2)),
        (SensorChannel::Dht22, SensorReading::active(24.5)),
        (SensorChannel::Ds18b20, SensorReading::active(23.9)),
    ])
}

// ── Telemetry state ──────────────────────────────────────────────────

/// Physical state vector advanced once per simulation tick.
///
/// The stability percentage is never stored; it is always derived from
/// `time_left` so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryState {
    /// Surface temperature in °C, within `[22, 100]`.
    pub temperature: f64,
    /// H2/CO concentration in %, within `[2, 100]`.
    pub gas_level: f64,
    /// Remaining thermal stability in seconds, within `[0, 600]`.
    pub time_left: f64,
    /// Per-channel readings. Display-only; the simulator never touches them.
    pub sensors: BTreeMap<SensorChannel, SensorReading>,
}

impl TelemetryState {
    /// State at session start.
    pub fn initial() -> Self {
        Self {
            temperature: INITIAL_TEMPERATURE,
            gas_level: INITIAL_GAS_LEVEL,
            time_left: MAX_STABILITY_TIME,
            sensors: default_sensors(),
        }
    }

    /// Build a state from raw readings, clamping each into its valid range.
    pub fn new(temperature: f64, gas_level: f64, time_left: f64) -> Self {
        Self {
            temperature: temperature.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX),
            gas_level: gas_level.clamp(GAS_MIN, GAS_MAX),
            time_left: time_left.clamp(0.0, MAX_STABILITY_TIME),
            sensors: default_sensors(),
        }
    }

    /// Remaining stability as a percentage of [`MAX_STABILITY_TIME`].
    pub fn stability_percent(&self) -> f64 {
        self.time_left / MAX_STABILITY_TIME * 100.0
    }

    /// Severity of the current readings.
    pub fn severity(&self) -> SeverityLevel {
        classify(self.temperature, self.gas_level)
    }

    /// True once the countdown has reached its terminal floor.
    pub fn is_depleted(&self) -> bool {
        self.time_left <= 0.0
    }

    /// True if every field is inside its declared range.
    pub fn is_valid(&self) -> bool {
        (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&self.temperature)
            && (GAS_MIN..=GAS_MAX).contains(&self.gas_level)
            && (0.0..=MAX_STABILITY_TIME).contains(&self.time_left)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            temperature: self.temperature,
            gas_level: self.gas_level,
            time_left: self.time_left,
            stability_percent: self.stability_percent(),
            severity: self.severity(),
            sensors: self.sensors.clone(),
        }
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Read-only view of a [`TelemetryState`] published to consumers each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub temperature: f64,
    pub gas_level: f64,
    pub time_left: f64,
    pub stability_percent: f64,
    pub severity: SeverityLevel,
    pub sensors: BTreeMap<SensorChannel, SensorReading>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        TelemetryState::initial().snapshot()
    }
}

// ── View selection ───────────────────────────────────────────────────

/// Which view the operator currently has selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Page {
    /// Gauges, countdown and the advisory panel.
    #[default]
    Home,
    /// Per-channel sensor readings.
    Sensors,
    /// Trend history and the exportable report.
    Bi,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Sensors => write!(f, "sensors"),
            Self::Bi => write!(f, "bi"),
        }
    }
}
