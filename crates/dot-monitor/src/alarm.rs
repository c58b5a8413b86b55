//! Audible alarm reactor.
//!
//! Follows the session bus and drives the siren: it sounds once per
//! [`SIREN_PERIOD`] while severity is critical and the alarm is not muted.
//! The "siren" here is a `warn!` line; a hardware buzzer would hook in at
//! [`AlarmReactor::run`].

use std::time::Duration;

use safety_core::display::AlarmView;
use safety_core::SeverityLevel;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::events::SessionEvent;

pub const SIREN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlarmState {
    pub severity: SeverityLevel,
    pub muted: bool,
    /// Times severity has entered Critical.
    pub activations: u32,
    pub siren_beeps: u64,
}

impl AlarmState {
    pub fn new(severity: SeverityLevel) -> Self {
        Self {
            severity,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AlarmView {
        AlarmView::new(self.severity, self.muted)
    }

    pub fn is_sounding(&self) -> bool {
        self.view().sounding
    }

    /// Fold one event into the alarm state. Returns true if the siren
    /// switched on or off.
    pub fn observe(&mut self, event: &SessionEvent) -> bool {
        let was_sounding = self.is_sounding();
        match event {
            SessionEvent::SeverityChanged { from, to, .. } => {
                self.severity = *to;
                if to.is_critical() && !from.is_critical() {
                    self.activations += 1;
                    error!(activation = self.activations, "{}", to.alarm_label());
                } else if from.is_critical() && !to.is_critical() {
                    info!("{}", to.alarm_label());
                }
            }
            SessionEvent::AlarmMuted { muted, .. } => {
                self.muted = *muted;
                info!(muted, "Alarm mute changed");
            }
            SessionEvent::StabilityDepleted { .. } => {
                error!("Thermal stability lost; failure is in progress");
            }
            _ => {}
        }
        was_sounding != self.is_sounding()
    }
}

pub struct AlarmReactor {
    events: broadcast::Receiver<SessionEvent>,
    state: AlarmState,
}

impl AlarmReactor {
    pub fn new(events: broadcast::Receiver<SessionEvent>, initial: SeverityLevel) -> Self {
        Self {
            events,
            state: AlarmState::new(initial),
        }
    }

    /// Run until the session ends, the bus closes, or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> AlarmState {
        let mut siren = interval(SIREN_PERIOD);
        siren.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                received = self.events.recv() => match received {
                    Ok(event) => {
                        let ended = matches!(event, SessionEvent::SessionEnded { .. });
                        if self.state.observe(&event) && self.state.is_sounding() {
                            siren.reset_immediately();
                        }
                        if ended {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Alarm reactor lagged behind session events");
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = siren.tick(), if self.state.is_sounding() => {
                    self.state.siren_beeps += 1;
                    warn!(
                        beep = self.state.siren_beeps,
                        "SIREN: {}",
                        self.state.severity.alarm_label()
                    );
                }
            }
        }

        self.state
    }
}
