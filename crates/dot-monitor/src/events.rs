//! Session event bus
//!
//! Pub/sub for session notifications over a Tokio broadcast channel. The
//! session task publishes; the alarm reactor, the CLI and tests subscribe.
//! Slow subscribers lag and skip events rather than blocking the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use safety_core::{Advisory, DegradedResponse, HistoryPoint, Page, SeverityLevel, TelemetrySnapshot};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Notifications emitted by a running session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SeverityChanged {
        from: SeverityLevel,
        to: SeverityLevel,
        snapshot: TelemetrySnapshot,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero.
    StabilityDepleted {
        snapshot: TelemetrySnapshot,
        at: DateTime<Utc>,
    },
    CriticalModeChanged {
        enabled: bool,
        at: DateTime<Utc>,
    },
    PageSelected {
        page: Page,
        at: DateTime<Utc>,
    },
    AlarmMuted {
        muted: bool,
        at: DateTime<Utc>,
    },
    HistorySampled {
        point: HistoryPoint,
    },
    AdvisoryStarted {
        at: DateTime<Utc>,
    },
    AdvisoryCompleted {
        response: DegradedResponse<Advisory>,
    },
    /// A request arrived while another was outstanding.
    AdvisoryRejected {
        at: DateTime<Utc>,
    },
    SessionEnded {
        ticks: u64,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SeverityChanged { .. } => "severity_changed",
            Self::StabilityDepleted { .. } => "stability_depleted",
            Self::CriticalModeChanged { .. } => "critical_mode_changed",
            Self::PageSelected { .. } => "page_selected",
            Self::AlarmMuted { .. } => "alarm_muted",
            Self::HistorySampled { .. } => "history_sampled",
            Self::AdvisoryStarted { .. } => "advisory_started",
            Self::AdvisoryCompleted { .. } => "advisory_completed",
            Self::AdvisoryRejected { .. } => "advisory_rejected",
            Self::SessionEnded { .. } => "session_ended",
        }
    }
}

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers. Returns the number that will see it.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "Event published");
                count
            }
            Err(_) => {
                // No receivers is OK
                debug!(event_type, "Event published (no receivers)");
                0
            }
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
