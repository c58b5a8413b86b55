//! Telemetry simulator.
//!
//! Advances a [`TelemetryState`] by one tick. In ambient mode both readings
//! take the same small random drift, `(draw - drift_bias) * drift_scale`.
//! In critical mode the drift is replaced by fixed positive increments.
//!
//! ## Countdown decay
//!
//! | Condition (new readings)             | Phase   | `time_left` per tick |
//! |--------------------------------------|---------|----------------------|
//! | `temp > 75` or `gas > 60`            | Runaway | -1.0                 |
//! | `temp > 45` or `gas > 30`            | Slow    | -0.05                |
//! | otherwise                            | Idle    | unchanged            |
//!
//! The countdown is never replenished and floors at zero.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::state::{TelemetryState, GAS_MAX, GAS_MIN, TEMPERATURE_MAX, TEMPERATURE_MIN};

/// Temperature above which the countdown starts to decay (°C).
pub const DECAY_TEMPERATURE: f64 = 45.0;
/// Gas concentration above which the countdown starts to decay (%).
pub const DECAY_GAS: f64 = 30.0;
/// Temperature above which decay becomes thermal runaway (°C).
pub const RUNAWAY_TEMPERATURE: f64 = 75.0;
/// Gas concentration above which decay becomes thermal runaway (%).
pub const RUNAWAY_GAS: f64 = 60.0;
/// Countdown loss per tick while decaying slowly.
pub const SLOW_DECAY_RATE: f64 = 0.05;
/// Countdown loss per tick during thermal runaway.
pub const RUNAWAY_DECAY_RATE: f64 = 1.0;

/// Tunables for the random walk and the critical profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Subtracted from the unit draw before scaling. With the default of
    /// 0.48 the expected ambient drift is +0.002 per tick.
    pub drift_bias: f64,
    /// Scale applied to the biased draw.
    pub drift_scale: f64,
    /// Temperature increment per tick in critical mode.
    pub critical_temperature_step: f64,
    /// Gas increment per tick in critical mode.
    pub critical_gas_step: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            drift_bias: 0.48,
            drift_scale: 0.1,
            critical_temperature_step: 0.3,
            critical_gas_step: 0.25,
        }
    }
}

impl SimulatorConfig {
    /// Ambient drift for a uniform draw in `[0, 1)`.
    pub fn drift(&self, draw: f64) -> f64 {
        (draw - self.drift_bias) * self.drift_scale
    }
}

/// How fast the countdown is being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayPhase {
    Idle,
    Slow,
    Runaway,
}

impl DecayPhase {
    pub fn of(temperature: f64, gas_level: f64) -> Self {
        if temperature > RUNAWAY_TEMPERATURE || gas_level > RUNAWAY_GAS {
            Self::Runaway
        } else if temperature > DECAY_TEMPERATURE || gas_level > DECAY_GAS {
            Self::Slow
        } else {
            Self::Idle
        }
    }

    /// Seconds removed from the countdown per tick.
    pub fn rate(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Slow => SLOW_DECAY_RATE,
            Self::Runaway => RUNAWAY_DECAY_RATE,
        }
    }

    pub fn is_decaying(self) -> bool {
        self != Self::Idle
    }
}

impl std::fmt::Display for DecayPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Slow => write!(f, "slow"),
            Self::Runaway => write!(f, "runaway"),
        }
    }
}

/// Produce the next state from `prev`.
///
/// `draw` is a uniform sample in `[0, 1)`; it is ignored in critical mode.
/// Pure: the caller owns the RNG, the cadence and the stored state.
pub fn step(
    prev: &TelemetryState,
    critical_mode: bool,
    draw: f64,
    config: &SimulatorConfig,
) -> TelemetryState {
    let (temperature_delta, gas_delta) = if critical_mode {
        (config.critical_temperature_step, config.critical_gas_step)
    } else {
        let drift = config.drift(draw);
        (drift, drift)
    };

    let temperature =
        (prev.temperature + temperature_delta).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
    let gas_level = (prev.gas_level + gas_delta).clamp(GAS_MIN, GAS_MAX);

    let phase = DecayPhase::of(temperature, gas_level);
    let time_left = if phase.is_decaying() {
        (prev.time_left - phase.rate()).max(0.0)
    } else {
        prev.time_left
    };

    TelemetryState {
        temperature,
        gas_level,
        time_left,
        sensors: prev.sensors.clone(),
    }
}

/// [`step`] bundled with its configuration and random source.
#[derive(Debug)]
pub struct Simulator<R = StdRng> {
    config: SimulatorConfig,
    rng: R,
    ticks: u64,
}

impl Simulator<StdRng> {
    /// Simulator seeded from the operating system.
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Reproducible simulator for tests and offline runs.
    pub fn seeded(config: SimulatorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Simulator<R> {
    pub fn with_rng(config: SimulatorConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            ticks: 0,
        }
    }

    /// Advance `prev` by one tick.
    pub fn advance(&mut self, prev: &TelemetryState, critical_mode: bool) -> TelemetryState {
        let draw: f64 = self.rng.random();
        self.ticks += 1;
        step(prev, critical_mode, draw, &self.config)
    }

    /// Uniform sample in `[0, 1)` from the simulator's random source.
    pub fn draw_unit(&mut self) -> f64 {
        self.rng.random()
    }

    /// Mutable access to the random source, for collaborators that sample
    /// synthetic values alongside the simulation.
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Number of ticks advanced so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}
