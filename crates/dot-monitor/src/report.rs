//! Report sinks.
//!
//! - history report: pretty JSON of the trend log, written at session end
//! - event log: append-only JSONL of session events
//! - text rendering for the terminal: report summary, per-frame status line
//!   and the sensor gauge panel

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use safety_core::display::{primary_gauges, sensor_gauges, CountdownStatus};
use safety_core::{HistoryReport, Page, SeverityLevel};
use tracing::info;

use crate::events::SessionEvent;
use crate::session::SessionView;

/// Write `report` as pretty JSON, creating parent directories as needed.
pub fn write_report(report: &HistoryReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = report
        .to_json_pretty()
        .context("Failed to serialize history report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        path = %path.display(),
        report = %report.short_id(),
        points = report.points.len(),
        "Wrote history report"
    );
    Ok(())
}

/// Append one event as a JSON line.
pub fn append_event(event: &SessionEvent, path: &Path) -> Result<()> {
    let json = serde_json::to_string(event).context("Failed to serialize event")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open event log {}", path.display()))?;
    writeln!(file, "{json}").with_context(|| format!("Failed to append to {}", path.display()))
}

pub fn format_report(report: &HistoryReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!("=== DOT Trend Report #{} ===", report.short_id()));
    lines.push(format!("Generated: {}", report.generated_at.to_rfc3339()));
    lines.push(String::new());

    match &report.summary {
        Some(summary) => {
            lines.push(format!("  Points: {}", summary.count));
            lines.push(format!(
                "  Temperature  min {:.2}  max {:.2}  mean {:.2} °C",
                summary.temperature.min, summary.temperature.max, summary.temperature.mean,
            ));
            lines.push(format!(
                "  Gas          min {:.2}  max {:.2}  mean {:.2} %",
                summary.gas.min, summary.gas.max, summary.gas.mean,
            ));
            lines.push(format!(
                "  Pressure     min {:.2}  max {:.2}  mean {:.2} kPa",
                summary.pressure.min, summary.pressure.max, summary.pressure.mean,
            ));
        }
        None => lines.push("  No samples recorded.".to_string()),
    }

    lines.join("\n")
}

/// One-line status for the terminal.
pub fn status_line(view: &SessionView) -> String {
    let snap = &view.snapshot;
    let [gas, temp] = primary_gauges(snap);
    let countdown = view.countdown();
    let tag = match view.severity() {
        SeverityLevel::Stable => "STABLE  ",
        SeverityLevel::Warning => "WARNING ",
        SeverityLevel::Critical => "CRITICAL",
    };
    let mut line = format!(
        concat!(
            "[{tag}] temp {:5.1}{} {:<5}  gas {:5.1}{} {:<5}  ",
            "stability {:5.1}%  countdown {}  decay {}"
        ),
        temp.value,
        temp.unit,
        temp.zone.to_string(),
        gas.value,
        gas.unit,
        gas.zone.to_string(),
        snap.stability_percent,
        countdown.headline(),
        view.decay_phase(),
        tag = tag,
    );
    if view.critical_mode {
        line.push_str("  [critical mode]");
    }
    if countdown.status == CountdownStatus::Extreme {
        line.push_str("  !! EXTREME");
    }
    if view.advisory_pending {
        line.push_str("  advisory: pending");
    } else if let Some(advisory) = &view.advisory {
        line.push_str(&format!(
            "  advisory[{}]: {}",
            advisory.level, advisory.payload.risk_level
        ));
    }
    line
}

/// Per-channel gauges, shown while the operator is on the sensors page.
pub fn sensor_panel(view: &SessionView) -> Option<String> {
    if view.page != Page::Sensors {
        return None;
    }
    let lines: Vec<String> = sensor_gauges(&view.snapshot)
        .iter()
        .map(|g| {
            format!(
                "  {:<8} {:6.2}{:<2} {:<5} needle {:+4.0}°",
                g.label,
                g.value,
                g.unit,
                g.zone.to_string(),
                g.needle_degrees
            )
        })
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use safety_core::{
        Advisory, DegradedResponse, HistoryLog, HistoryPoint, Page, TelemetryState,
    };

    use super::*;

    fn view(state: TelemetryState, critical_mode: bool) -> SessionView {
        SessionView {
            snapshot: state.snapshot(),
            critical_mode,
            page: Page::Home,
            muted: false,
            advisory: None,
            advisory_pending: false,
            ticks: 0,
        }
    }

    #[test]
    fn status_line_for_quiet_state() {
        let line = status_line(&view(TelemetryState::initial(), false));
        assert!(line.starts_with("[STABLE  ]"));
        assert!(line.contains("MONITORING..."));
        assert!(line.contains("decay idle"));
        assert!(!line.contains("critical mode"));
    }

    #[test]
    fn status_line_for_runaway() {
        let mut v = view(TelemetryState::new(90.0, 70.0, 60.0), true);
        v.advisory = Some(DegradedResponse::partial(
            Advisory::new("Explosion risk (local)", "Evacuate", "Soon"),
            "local-rules",
            0.6,
            "quota",
        ));
        let line = status_line(&v);
        assert!(line.starts_with("[CRITICAL]"));
        assert!(line.contains("1m 0s"));
        assert!(line.contains("decay runaway"));
        assert!(line.contains("[critical mode]"));
        assert!(line.contains("EXTREME"));
        assert!(line.contains("advisory[partial]: Explosion risk (local)"));
    }

    #[test]
    fn status_line_shows_gauge_zones() {
        let line = status_line(&view(TelemetryState::new(90.0, 50.0, 300.0), false));
        assert!(line.contains("temp  90.0°C red"));
        assert!(line.contains("gas  50.0% amber"));
    }

    #[test]
    fn sensor_panel_only_on_sensors_page() {
        let mut v = view(TelemetryState::initial(), false);
        assert!(sensor_panel(&v).is_none());

        v.page = Page::Sensors;
        let panel = sensor_panel(&v).unwrap();
        assert_eq!(panel.lines().count(), 6);
        assert!(panel.lines().any(|l| l.trim_start().starts_with("DHT22")));
        assert!(panel.contains("green"));
    }

    #[test]
    fn empty_report_renders() {
        let report = HistoryLog::new().report(Utc::now());
        let text = format_report(&report);
        assert!(text.contains(&report.short_id()));
        assert!(text.contains("No samples recorded."));
    }

    #[test]
    fn report_summary_renders() {
        let mut log = HistoryLog::new();
        let snap = TelemetryState::new(30.0, 10.0, 600.0).snapshot();
        log.push(HistoryPoint::sample(&snap, Utc::now(), 0.5));
        let text = format_report(&log.report(Utc::now()));
        assert!(text.contains("Points: 1"));
        assert!(text.contains("mean 30.00 °C"));
    }
}
