//! Telemetry state owned by a monitoring session.
//!
//! [`TelemetryState`] is the mutable vector advanced by the simulator.
//! [`TelemetrySnapshot`] is the read-only copy handed to every consumer
//! (display, alarms, history, advisory) once per tick.

mod types;

pub use types::*;
