//! Live monitoring session.
//!
//! A session is one Tokio task that owns the telemetry state and is its only
//! mutator. It multiplexes the simulation interval, the history interval,
//! operator commands, completed advisories and a cancellation token in a
//! single `select!` loop. Consumers read the latest [`SessionView`] from a
//! `watch` channel and follow [`SessionEvent`]s on the bus.
//!
//! Timers live inside the task, so cancelling it releases them. The
//! [`SessionHandle`] cancels on drop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use safety_core::display::{AlarmView, CountdownView};
use safety_core::{
    Advisory, AdvisoryError, AdvisoryInput, AdvisoryProvider, DecayPhase, DegradedResponse,
    HistoryLog, HistoryPoint, Page, SeverityLevel, Simulator, TelemetrySnapshot, TelemetryState,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::advisor::{AdvisoryService, FlightGuard};
use crate::config::MonitorConfig;
use crate::events::{EventBus, SessionEvent, SharedEventBus};

const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session has ended")]
    Closed,

    #[error(transparent)]
    Advisory(#[from] AdvisoryError),

    #[error("Session task failed: {0}")]
    Join(String),

    #[error("Invalid session config: {0}")]
    Config(String),
}

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub snapshot: TelemetrySnapshot,
    pub critical_mode: bool,
    pub page: Page,
    pub muted: bool,
    /// Latest completed advisory, if any.
    pub advisory: Option<DegradedResponse<Advisory>>,
    pub advisory_pending: bool,
    pub ticks: u64,
}

impl SessionView {
    fn initial(state: &TelemetryState) -> Self {
        Self {
            snapshot: state.snapshot(),
            critical_mode: false,
            page: Page::default(),
            muted: false,
            advisory: None,
            advisory_pending: false,
            ticks: 0,
        }
    }

    pub fn severity(&self) -> SeverityLevel {
        self.snapshot.severity
    }

    pub fn countdown(&self) -> CountdownView {
        CountdownView::from_snapshot(&self.snapshot, self.critical_mode)
    }

    pub fn alarm(&self) -> AlarmView {
        AlarmView::new(self.snapshot.severity, self.muted)
    }

    pub fn decay_phase(&self) -> DecayPhase {
        DecayPhase::of(self.snapshot.temperature, self.snapshot.gas_level)
    }
}

/// What a session leaves behind after teardown.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub ticks: u64,
    pub final_snapshot: TelemetrySnapshot,
    pub history: HistoryLog,
}

enum Command {
    SetCritical(bool),
    ToggleCritical,
    SelectPage(Page),
    SetMuted(bool),
    Advise(FlightGuard),
    History(oneshot::Sender<HistoryLog>),
}

/// State owned by the session task.
pub struct Session {
    state: TelemetryState,
    severity: SeverityLevel,
    critical_mode: bool,
    page: Page,
    muted: bool,
    advisory: Option<DegradedResponse<Advisory>>,
    advisory_pending: bool,
    simulator: Simulator,
    history: HistoryLog,
    advisor: AdvisoryService,
    bus: SharedEventBus,
    view_tx: watch::Sender<SessionView>,
    tick_interval: Duration,
    history_interval: Duration,
}

impl Session {
    /// Start a session on the current Tokio runtime.
    pub fn spawn(
        config: &MonitorConfig,
        provider: Arc<dyn AdvisoryProvider>,
    ) -> Result<SessionHandle, SessionError> {
        let advisor = AdvisoryService::new(provider, config.advisory_timeout());
        Self::spawn_with(config, advisor, EventBus::new().shared())
    }

    /// Start a session around an existing advisory service and bus.
    ///
    /// Rejects configs that fail [`MonitorConfig::validate`]; a zero period
    /// cannot drive an interval.
    pub fn spawn_with(
        config: &MonitorConfig,
        advisor: AdvisoryService,
        bus: SharedEventBus,
    ) -> Result<SessionHandle, SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::Config(format!("{e:#}")))?;
        let mut simulator = match config.seed {
            Some(seed) => Simulator::seeded(config.simulator.clone(), seed),
            None => Simulator::new(config.simulator.clone()),
        };
        let history = if config.backfill_history {
            HistoryLog::backfilled(Utc::now(), simulator.rng_mut())
        } else {
            HistoryLog::new()
        };

        let state = TelemetryState::initial();
        let (view_tx, view_rx) = watch::channel(SessionView::initial(&state));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let cancel = CancellationToken::new();

        let session = Session {
            severity: state.severity(),
            state,
            critical_mode: false,
            page: Page::default(),
            muted: false,
            advisory: None,
            advisory_pending: false,
            simulator,
            history,
            advisor: advisor.clone(),
            bus: Arc::clone(&bus),
            view_tx,
            tick_interval: config.tick_interval(),
            history_interval: config.history_interval(),
        };

        info!(
            tick_ms = config.tick_ms,
            history_secs = config.history_secs,
            provider = advisor.provider_name(),
            "Session started"
        );
        let task = tokio::spawn(session.run(command_rx, cancel.clone()));

        Ok(SessionHandle {
            commands: command_tx,
            view: view_rx,
            bus,
            advisor,
            cancel,
            task: Some(task),
        })
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        let start = Instant::now();
        let mut sim_tick = interval_at(start + self.tick_interval, self.tick_interval);
        sim_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut history_tick = interval_at(start + self.history_interval, self.history_interval);
        history_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (advisory_tx, mut advisory_rx) = mpsc::channel::<DegradedResponse<Advisory>>(1);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = sim_tick.tick() => self.on_tick(),

                _ = history_tick.tick() => self.on_history_sample(),

                Some(command) = commands.recv() => self.on_command(command, &advisory_tx),

                Some(response) = advisory_rx.recv() => self.on_advisory(response),
            }
        }

        self.finish()
    }

    fn on_tick(&mut self) {
        let was_depleted = self.state.is_depleted();
        self.state = self.simulator.advance(&self.state, self.critical_mode);

        let severity = self.state.severity();
        if severity != self.severity {
            let from = self.severity;
            self.severity = severity;
            match severity {
                SeverityLevel::Critical => error!(
                    temperature = self.state.temperature,
                    gas = self.state.gas_level,
                    "Severity escalated to CRITICAL"
                ),
                SeverityLevel::Warning => warn!(%from, "Severity changed to WARNING"),
                SeverityLevel::Stable => info!(%from, "Severity back to STABLE"),
            }
            self.bus.publish(SessionEvent::SeverityChanged {
                from,
                to: severity,
                snapshot: self.state.snapshot(),
                at: Utc::now(),
            });
        }

        if !was_depleted && self.state.is_depleted() {
            error!(ticks = self.simulator.ticks(), "Thermal stability countdown exhausted");
            self.bus.publish(SessionEvent::StabilityDepleted {
                snapshot: self.state.snapshot(),
                at: Utc::now(),
            });
        }

        self.publish_view();
    }

    fn on_history_sample(&mut self) {
        let draw = self.simulator.draw_unit();
        let point = HistoryPoint::sample(&self.state.snapshot(), Utc::now(), draw);
        self.history.push(point.clone());
        self.bus.publish(SessionEvent::HistorySampled { point });
    }

    fn on_command(
        &mut self,
        command: Command,
        advisory_tx: &mpsc::Sender<DegradedResponse<Advisory>>,
    ) {
        match command {
            Command::SetCritical(enabled) => self.set_critical(enabled),
            Command::ToggleCritical => self.set_critical(!self.critical_mode),
            Command::SelectPage(page) => {
                if page != self.page {
                    debug!(%page, "Page selected");
                    self.page = page;
                    self.bus.publish(SessionEvent::PageSelected {
                        page,
                        at: Utc::now(),
                    });
                    self.publish_view();
                }
            }
            Command::SetMuted(muted) => {
                if muted != self.muted {
                    self.muted = muted;
                    self.bus.publish(SessionEvent::AlarmMuted {
                        muted,
                        at: Utc::now(),
                    });
                    self.publish_view();
                }
            }
            Command::Advise(flight) => self.start_advisory(flight, advisory_tx),
            Command::History(reply) => {
                // Requester may have gone away; nothing to do then.
                let _ = reply.send(self.history.clone());
            }
        }
    }

    fn set_critical(&mut self, enabled: bool) {
        if enabled == self.critical_mode {
            return;
        }
        self.critical_mode = enabled;
        if enabled {
            warn!("Critical mode engaged");
        } else {
            info!("Critical mode released");
        }
        self.bus.publish(SessionEvent::CriticalModeChanged {
            enabled,
            at: Utc::now(),
        });
        self.publish_view();
    }

    fn start_advisory(
        &mut self,
        flight: FlightGuard,
        advisory_tx: &mpsc::Sender<DegradedResponse<Advisory>>,
    ) {
        let input = AdvisoryInput::from_state(&self.state);
        let advisor = self.advisor.clone();
        let tx = advisory_tx.clone();

        debug!(telemetry = %input.telemetry_line(), "Advisory requested");
        self.advisory_pending = true;
        self.bus.publish(SessionEvent::AdvisoryStarted { at: Utc::now() });
        self.publish_view();

        // Not tied to the session's cancellation: if the session ends first
        // the result has nowhere to go and is dropped.
        tokio::spawn(async move {
            let response = advisor.run_flight(flight, &input).await;
            if tx.send(response).await.is_err() {
                debug!("Session ended before the advisory completed; result discarded");
            }
        });
    }

    fn on_advisory(&mut self, response: DegradedResponse<Advisory>) {
        self.advisory_pending = false;
        self.advisory = Some(response.clone());
        self.bus.publish(SessionEvent::AdvisoryCompleted { response });
        self.publish_view();
    }

    fn view(&self) -> SessionView {
        SessionView {
            snapshot: self.state.snapshot(),
            critical_mode: self.critical_mode,
            page: self.page,
            muted: self.muted,
            advisory: self.advisory.clone(),
            advisory_pending: self.advisory_pending,
            ticks: self.simulator.ticks(),
        }
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(self.view());
    }

    fn finish(self) -> SessionOutcome {
        let ticks = self.simulator.ticks();
        info!(ticks, history_points = self.history.len(), "Session stopped");
        self.bus.publish(SessionEvent::SessionEnded {
            ticks,
            at: Utc::now(),
        });
        SessionOutcome {
            ticks,
            final_snapshot: self.state.snapshot(),
            history: self.history,
        }
    }
}

/// Operator-side handle to a running session. Dropping it stops the session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    bus: SharedEventBus,
    advisor: AdvisoryService,
    cancel: CancellationToken,
    task: Option<JoinHandle<SessionOutcome>>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn set_critical(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(Command::SetCritical(enabled)).await
    }

    pub async fn toggle_critical(&self) -> Result<(), SessionError> {
        self.send(Command::ToggleCritical).await
    }

    pub async fn select_page(&self, page: Page) -> Result<(), SessionError> {
        self.send(Command::SelectPage(page)).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), SessionError> {
        self.send(Command::SetMuted(muted)).await
    }

    /// Ask for an advisory on the current telemetry.
    ///
    /// Returns as soon as the request is accepted; the result arrives as an
    /// [`SessionEvent::AdvisoryCompleted`] and in the view. Fails with
    /// `Busy` while another request is outstanding.
    pub async fn request_advisory(&self) -> Result<(), SessionError> {
        let flight = match self.advisor.try_begin() {
            Ok(flight) => flight,
            Err(e) => {
                debug!("Advisory request rejected: one already in flight");
                self.bus
                    .publish(SessionEvent::AdvisoryRejected { at: Utc::now() });
                return Err(e.into());
            }
        };
        // On a closed session the guard is dropped with the unsent command.
        self.send(Command::Advise(flight)).await
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.view.borrow().snapshot.clone()
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified whenever the view changes.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    pub fn events(&self) -> SharedEventBus {
        Arc::clone(&self.bus)
    }

    pub fn advisor(&self) -> &AdvisoryService {
        &self.advisor
    }

    /// Copy of the trend log.
    pub async fn history(&self) -> Result<HistoryLog, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::History(reply)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the session and wait for its task to exit.
    pub async fn shutdown(mut self) -> Result<SessionOutcome, SessionError> {
        self.cancel.cancel();
        let task = self.task.take().ok_or(SessionError::Closed)?;
        task.await.map_err(|e| SessionError::Join(e.to_string()))
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
