//! DOT Safety Core
//!
//! Pure building blocks of the battery safety monitor:
//! - `simulator`: bounded random-walk telemetry and thermal-runaway countdown
//! - `classifier`: threshold classification into Stable / Warning / Critical
//! - `history`: sampled trend log and exportable reports
//! - `advisory`: provider interface for safety advisories plus the local rule table
//! - `resilience`: degradation metadata for advisory responses
//! - `display`: gauge zones, countdown and alarm views derived from a snapshot
//!
//! Nothing in this crate owns a clock or a timer. The monitor runtime drives
//! the tick cadence and is the only mutator of the telemetry state.
//!
//! # Usage
//!
//! ```rust
//! use safety_core::{classify, simulator::step, SeverityLevel, SimulatorConfig, TelemetryState};
//!
//! let config = SimulatorConfig::default();
//! let mut state = TelemetryState::initial();
//! for _ in 0..10 {
//!     state = step(&state, true, 0.5, &config);
//! }
//! assert_eq!(classify(state.temperature, state.gas_level), SeverityLevel::Stable);
//! ```

pub mod advisory;
pub mod classifier;
pub mod display;
pub mod history;
pub mod resilience;
pub mod simulator;
pub mod state;

pub use advisory::{
    Advisory, AdvisoryError, AdvisoryInput, AdvisoryProvider, AdvisoryTier, FailureCategory,
    LocalRuleProvider,
};
pub use classifier::{classify, SeverityLevel};
pub use history::{HistoryLog, HistoryPoint, HistoryReport, HistorySummary};
pub use resilience::{DegradationLevel, DegradedResponse};
pub use simulator::{DecayPhase, Simulator, SimulatorConfig};
pub use state::{
    Page, SensorChannel, SensorReading, TelemetrySnapshot, TelemetryState, MAX_STABILITY_TIME,
};
