//! Session integration tests on a paused Tokio clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dot_monitor::config::MonitorConfig;
use dot_monitor::events::SessionEvent;
use dot_monitor::session::{Session, SessionError};
use safety_core::{
    Advisory, AdvisoryError, AdvisoryInput, AdvisoryProvider, DegradationLevel, LocalRuleProvider,
    Page, SeverityLevel,
};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

fn test_config() -> MonitorConfig {
    MonitorConfig {
        backfill_history: false,
        seed: Some(11),
        ..MonitorConfig::builtin()
    }
}

/// Provider that takes a while and counts its calls.
struct SlowProvider {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AdvisoryProvider for SlowProvider {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn advise(&self, _input: &AdvisoryInput) -> Result<Advisory, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Advisory::new("Nominal", "Continue monitoring", "No change expected"))
    }
}

/// Wait for the first event matching `pred`, skipping everything else.
async fn wait_for_event<F>(rx: &mut Receiver<SessionEvent>, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    loop {
        match rx.recv().await {
            Ok(event) if pred(&event) => return event,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => panic!("bus closed before the expected event"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn critical_mode_drives_severity_to_critical() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();
    let mut rx = handle.subscribe();

    handle.set_critical(true).await.unwrap();

    let event = tokio::time::timeout(
        Duration::from_secs(120),
        wait_for_event(&mut rx, |e| {
            matches!(
                e,
                SessionEvent::SeverityChanged {
                    to: SeverityLevel::Critical,
                    ..
                }
            )
        }),
    )
    .await
    .expect("no critical escalation within two minutes");

    match event {
        SessionEvent::SeverityChanged { from, snapshot, .. } => {
            assert_eq!(from, SeverityLevel::Warning);
            assert!(snapshot.temperature > 85.0 || snapshot.gas_level > 75.0);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let view = handle.view();
    assert!(view.critical_mode);
    assert_eq!(view.severity(), SeverityLevel::Critical);
    assert!(view.alarm().sounding);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn toggle_emits_mode_changes() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();
    let mut rx = handle.subscribe();

    handle.toggle_critical().await.unwrap();
    handle.toggle_critical().await.unwrap();

    let first = wait_for_event(&mut rx, |e| {
        matches!(e, SessionEvent::CriticalModeChanged { .. })
    })
    .await;
    let second = wait_for_event(&mut rx, |e| {
        matches!(e, SessionEvent::CriticalModeChanged { .. })
    })
    .await;
    assert!(matches!(first, SessionEvent::CriticalModeChanged { enabled: true, .. }));
    assert!(matches!(second, SessionEvent::CriticalModeChanged { enabled: false, .. }));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn countdown_never_increases_over_a_live_session() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();
    let mut watch = handle.watch();
    handle.set_critical(true).await.unwrap();

    let mut last = handle.snapshot().time_left;
    for _ in 0..300 {
        watch.changed().await.unwrap();
        let time_left = watch.borrow_and_update().snapshot.time_left;
        assert!(time_left <= last);
        last = time_left;
    }
    assert!(last < 600.0);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn history_is_sampled_on_its_own_cadence() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let history = handle.history().await.unwrap();
    assert_eq!(history.len(), 2);

    let outcome = handle.shutdown().await.unwrap();
    assert_eq!(outcome.history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn backfilled_session_starts_with_trend_data() {
    let config = MonitorConfig {
        backfill_history: true,
        ..test_config()
    };
    let handle = Session::spawn(&config, Arc::new(LocalRuleProvider::new())).unwrap();
    let history = handle.history().await.unwrap();
    assert_eq!(history.len(), safety_core::history::BACKFILL_POINTS);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn advisory_requests_are_single_flight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = SlowProvider {
        delay: Duration::from_secs(2),
        calls: Arc::clone(&calls),
    };
    let handle = Session::spawn(&test_config(), Arc::new(provider)).unwrap();
    let mut rx = handle.subscribe();

    handle.request_advisory().await.unwrap();
    let second = handle.request_advisory().await;
    assert!(matches!(
        second,
        Err(SessionError::Advisory(AdvisoryError::Busy))
    ));
    assert!(handle.advisor().is_busy());

    let completed = wait_for_event(&mut rx, |e| {
        matches!(e, SessionEvent::AdvisoryCompleted { .. })
    })
    .await;
    match completed {
        SessionEvent::AdvisoryCompleted { response } => {
            assert_eq!(response.level, DegradationLevel::Full);
            assert_eq!(response.served_by, "slow");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Slot is free again once the first request finished.
    handle.request_advisory().await.unwrap();
    wait_for_event(&mut rx, |e| {
        matches!(e, SessionEvent::AdvisoryCompleted { .. })
    })
    .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let view = handle.view();
    assert!(!view.advisory_pending);
    assert!(view.advisory.is_some());
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn busy_rejection_is_published() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = SlowProvider {
        delay: Duration::from_secs(5),
        calls,
    };
    let handle = Session::spawn(&test_config(), Arc::new(provider)).unwrap();
    let mut rx = handle.subscribe();

    handle.request_advisory().await.unwrap();
    assert!(handle.request_advisory().await.is_err());
    wait_for_event(&mut rx, |e| {
        matches!(e, SessionEvent::AdvisoryRejected { .. })
    })
    .await;
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn page_and_mute_are_operator_state() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();
    let mut watch = handle.watch();

    handle.select_page(Page::Bi).await.unwrap();
    handle.set_muted(true).await.unwrap();
    watch
        .wait_for(|v| v.page == Page::Bi && v.muted)
        .await
        .unwrap();

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_session_task() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();
    let mut rx = handle.subscribe();
    let bus = handle.events();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let outcome = handle.shutdown().await.unwrap();
    assert!(outcome.ticks >= 9);

    wait_for_event(&mut rx, |e| matches!(e, SessionEvent::SessionEnded { .. })).await;

    // Nothing publishes after teardown.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    drop(bus);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_cancels_the_session() {
    let handle = Session::spawn(&test_config(), Arc::new(LocalRuleProvider::new())).unwrap();
    let mut rx = handle.subscribe();
    drop(handle);

    let ended = tokio::time::timeout(
        Duration::from_secs(1),
        wait_for_event(&mut rx, |e| matches!(e, SessionEvent::SessionEnded { .. })),
    )
    .await;
    assert!(ended.is_ok());
}

#[tokio::test(start_paused = true)]
async fn late_advisory_result_is_discarded_after_shutdown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = SlowProvider {
        delay: Duration::from_secs(3),
        calls: Arc::clone(&calls),
    };
    let handle = Session::spawn(&test_config(), Arc::new(provider)).unwrap();
    handle.request_advisory().await.unwrap();
    let advisor = handle.advisor().clone();

    // Let the session hand the request to its worker before stopping.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown().await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!advisor.is_busy());
}

#[tokio::test]
async fn zero_tick_config_is_an_error_not_a_dead_task() {
    let config = MonitorConfig {
        tick_ms: 0,
        ..test_config()
    };
    match Session::spawn(&config, Arc::new(LocalRuleProvider::new())) {
        Err(SessionError::Config(msg)) => assert!(msg.contains("tick_ms")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("session spawned with a zero tick period"),
    }
}
