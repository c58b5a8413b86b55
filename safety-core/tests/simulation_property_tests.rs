//! Simulation property tests: randomized validation of the telemetry
//! invariants across seeds, starting states and operating modes.
//!
//! Tests verify:
//! - Readings stay inside their clamp ranges
//! - The countdown never increases, and decreases monotonically in critical mode
//! - Stability percent is always derived exactly from the countdown
//! - Runaway decay kicks in once critical mode crosses the runaway thresholds
//! - The countdown floor at zero is terminal

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use safety_core::simulator::{step, DecayPhase, RUNAWAY_DECAY_RATE, SLOW_DECAY_RATE};
use safety_core::{classify, SeverityLevel, Simulator, SimulatorConfig, TelemetryState};

const SEEDS: [u64; 6] = [1, 2, 3, 42, 1_000, 65_535];

/// Random valid starting state.
fn random_state(rng: &mut StdRng) -> TelemetryState {
    TelemetryState::new(
        rng.random_range(22.0..=100.0),
        rng.random_range(2.0..=100.0),
        rng.random_range(0.0..=600.0),
    )
}

// ── Property: clamp invariant ──────────────────────────────────────

#[test]
fn prop_readings_stay_in_range_under_ambient_drift() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sim = Simulator::seeded(SimulatorConfig::default(), seed);
        for _ in 0..20 {
            let mut state = random_state(&mut rng);
            for _ in 0..500 {
                state = sim.advance(&state, false);
                assert!(state.is_valid(), "seed {seed}: invalid state {state:?}");
            }
        }
    }
}

#[test]
fn prop_readings_stay_in_range_with_extreme_bias() {
    for bias in [-5.0, 0.0, 1.0, 5.0] {
        let config = SimulatorConfig {
            drift_bias: bias,
            drift_scale: 3.0,
            ..SimulatorConfig::default()
        };
        let mut sim = Simulator::seeded(config, 9);
        let mut state = TelemetryState::initial();
        for _ in 0..2_000 {
            state = sim.advance(&state, false);
            assert!(state.is_valid(), "bias {bias}: invalid state {state:?}");
        }
    }
}

#[test]
fn prop_mixed_modes_keep_state_valid() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sim = Simulator::seeded(SimulatorConfig::default(), seed);
        let mut state = TelemetryState::initial();
        for _ in 0..3_000 {
            let critical = rng.random_bool(0.3);
            state = sim.advance(&state, critical);
            assert!(state.is_valid());
        }
    }
}

// ── Property: no replenishment ─────────────────────────────────────

#[test]
fn prop_countdown_never_increases() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sim = Simulator::seeded(SimulatorConfig::default(), seed);
        let mut state = random_state(&mut rng);
        for _ in 0..2_000 {
            let critical = rng.random_bool(0.5);
            let next = sim.advance(&state, critical);
            assert!(
                next.time_left <= state.time_left,
                "seed {seed}: {} -> {}",
                state.time_left,
                next.time_left
            );
            state = next;
        }
    }
}

#[test]
fn prop_countdown_monotonic_under_sustained_critical_mode() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = random_state(&mut rng);
        let config = SimulatorConfig::default();
        let mut previous = state.time_left;
        for _ in 0..1_000 {
            state = step(&state, true, rng.random(), &config);
            assert!(state.time_left <= previous);
            previous = state.time_left;
        }
    }
}

// ── Property: derived stability ────────────────────────────────────

#[test]
fn prop_stability_percent_is_exactly_derived() {
    let mut sim = Simulator::seeded(SimulatorConfig::default(), 5);
    let mut state = TelemetryState::new(70.0, 50.0, 600.0);
    for i in 0..1_500 {
        state = sim.advance(&state, i % 3 == 0);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.stability_percent, state.time_left / 600.0 * 100.0);
        assert_eq!(state.stability_percent(), state.time_left / 600.0 * 100.0);
    }
}

// ── Scenario: critical escalation from session start ───────────────

#[test]
fn critical_mode_reaches_fast_decay_from_initial_state() {
    let config = SimulatorConfig::default();
    let mut state = TelemetryState::initial();
    assert_eq!(state.temperature, 24.5);
    assert_eq!(state.gas_level, 5.2);
    assert_eq!(state.time_left, 600.0);

    let mut ticks = 0;
    while DecayPhase::of(state.temperature, state.gas_level) != DecayPhase::Runaway {
        state = step(&state, true, 0.5, &config);
        ticks += 1;
        assert!(ticks < 1_000, "never reached runaway");
    }
    assert!(state.temperature > 75.0 || state.gas_level > 60.0);

    // From here every tick costs the fast rate, not the slow one.
    for _ in 0..20 {
        let before = state.time_left;
        state = step(&state, true, 0.5, &config);
        let lost = before - state.time_left;
        assert!((lost - RUNAWAY_DECAY_RATE).abs() < 1e-9, "lost {lost}");
        assert!((lost - SLOW_DECAY_RATE).abs() > 0.5);
    }
}

#[test]
fn critical_mode_walks_severity_up_through_every_level() {
    let config = SimulatorConfig::default();
    let mut state = TelemetryState::initial();
    let mut seen = vec![state.severity()];
    for _ in 0..400 {
        state = step(&state, true, 0.0, &config);
        let level = classify(state.temperature, state.gas_level);
        if seen.last() != Some(&level) {
            seen.push(level);
        }
    }
    assert_eq!(
        seen,
        vec![
            SeverityLevel::Stable,
            SeverityLevel::Warning,
            SeverityLevel::Critical
        ]
    );
}

// ── Property: terminal floor ───────────────────────────────────────

#[test]
fn prop_zero_countdown_is_terminal() {
    let config = SimulatorConfig::default();
    let mut rng = StdRng::seed_from_u64(77);
    let mut state = TelemetryState::new(99.0, 99.0, 600.0);
    while !state.is_depleted() {
        state = step(&state, true, 0.5, &config);
    }
    for _ in 0..500 {
        state = step(&state, rng.random_bool(0.5), rng.random(), &config);
        assert_eq!(state.time_left, 0.0);
        assert_eq!(state.stability_percent(), 0.0);
    }
}
