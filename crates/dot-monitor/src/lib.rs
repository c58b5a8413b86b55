//! DOT monitor runtime
//!
//! Drives the pure pieces from `safety-core` on a Tokio runtime:
//! - `session`: the tick-driven session task and its operator handle
//! - `advisor`: single-flight advisory service with deadline and fallback
//! - `providers`: the remote Gemini provider and provider selection
//! - `events`: broadcast bus for session notifications
//! - `alarm`: siren reactor following the bus
//! - `report`: history report, event log and terminal rendering
//! - `trajectory`: offline simulation runs
//! - `config`: layered configuration

pub mod advisor;
pub mod alarm;
pub mod config;
pub mod events;
pub mod providers;
pub mod report;
pub mod session;
pub mod trajectory;

pub use advisor::{AdvisoryService, FlightGuard};
pub use config::{GeminiConfig, MonitorConfig};
pub use events::{EventBus, SessionEvent, SharedEventBus};
pub use session::{Session, SessionError, SessionHandle, SessionOutcome, SessionView};
