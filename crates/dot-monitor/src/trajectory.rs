//! Offline simulation runs for the `simulate` subcommand.

use safety_core::simulator::DecayPhase;
use safety_core::{SeverityLevel, Simulator, SimulatorConfig, TelemetrySnapshot, TelemetryState};
use serde::Serialize;

/// What happened over an offline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectorySummary {
    pub ticks: u64,
    pub critical_mode: bool,
    pub seed: Option<u64>,
    pub final_state: TelemetrySnapshot,
    pub peak_temperature: f64,
    pub peak_gas: f64,
    /// First tick at which each level was reached, in order.
    pub severity_transitions: Vec<(u64, SeverityLevel)>,
    pub first_runaway_tick: Option<u64>,
    pub depleted_at_tick: Option<u64>,
}

pub fn run_trajectory(
    config: &SimulatorConfig,
    ticks: u64,
    critical_mode: bool,
    seed: Option<u64>,
) -> TrajectorySummary {
    let mut sim = match seed {
        Some(seed) => Simulator::seeded(config.clone(), seed),
        None => Simulator::new(config.clone()),
    };

    let mut state = TelemetryState::initial();
    let mut severity = state.severity();
    let mut summary = TrajectorySummary {
        ticks,
        critical_mode,
        seed,
        final_state: state.snapshot(),
        peak_temperature: state.temperature,
        peak_gas: state.gas_level,
        severity_transitions: vec![(0, severity)],
        first_runaway_tick: None,
        depleted_at_tick: None,
    };

    for tick in 1..=ticks {
        state = sim.advance(&state, critical_mode);
        summary.peak_temperature = summary.peak_temperature.max(state.temperature);
        summary.peak_gas = summary.peak_gas.max(state.gas_level);

        let level = state.severity();
        if level != severity {
            severity = level;
            summary.severity_transitions.push((tick, level));
        }
        if summary.first_runaway_tick.is_none()
            && DecayPhase::of(state.temperature, state.gas_level) == DecayPhase::Runaway
        {
            summary.first_runaway_tick = Some(tick);
        }
        if summary.depleted_at_tick.is_none() && state.is_depleted() {
            summary.depleted_at_tick = Some(tick);
        }
    }

    summary.final_state = state.snapshot();
    summary
}

impl TrajectorySummary {
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "Simulated {} ticks ({} mode{})",
            self.ticks,
            if self.critical_mode { "critical" } else { "ambient" },
            self.seed.map(|s| format!(", seed {s}")).unwrap_or_default(),
        )];
        let f = &self.final_state;
        lines.push(format!(
            "  Final: temp {:.2}°C  gas {:.2}%  countdown {:.1}s  stability {:.1}%  {}",
            f.temperature, f.gas_level, f.time_left, f.stability_percent, f.severity
        ));
        lines.push(format!(
            "  Peaks: temp {:.2}°C  gas {:.2}%",
            self.peak_temperature, self.peak_gas
        ));
        for (tick, level) in &self.severity_transitions {
            lines.push(format!("  tick {tick:>6}: {level}"));
        }
        if let Some(tick) = self.first_runaway_tick {
            lines.push(format!("  Runaway decay from tick {tick}"));
        }
        if let Some(tick) = self.depleted_at_tick {
            lines.push(format!("  Countdown exhausted at tick {tick}"));
        }
        lines.join("\n")
    }
}
