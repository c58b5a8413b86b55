//! Trend history and the exportable BI report.
//!
//! The session samples its snapshot into a [`HistoryLog`] on a slow cadence.
//! The log is bounded: an append keeps the newest 100 points plus the new one.
//! A fresh log can be backfilled with quiet ambient readings so that trend
//! output has something to show from the first second.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::state::TelemetrySnapshot;

/// Maximum number of points retained.
pub const HISTORY_CAPACITY: usize = 101;
/// Nominal cabinet pressure (kPa) the synthetic pressure series wobbles around.
pub const BASELINE_PRESSURE_KPA: f64 = 101.3;
/// Number of points seeded by [`HistoryLog::backfilled`].
pub const BACKFILL_POINTS: usize = 41;
/// Spacing between backfilled points.
pub const BACKFILL_SPACING_SECS: i64 = 10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One sampled row of the trend log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Wall-clock label for chart axes.
    pub time: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub temperature: f64,
    /// Synthetic cabinet pressure (kPa).
    pub pressure: f64,
    pub gas: f64,
}

impl HistoryPoint {
    /// Sample a snapshot. `pressure_draw` is a uniform sample in `[0, 1)`.
    pub fn sample(snapshot: &TelemetrySnapshot, at: DateTime<Utc>, pressure_draw: f64) -> Self {
        Self {
            time: at.format("%H:%M:%S").to_string(),
            timestamp: at.timestamp_millis(),
            temperature: round2(snapshot.temperature),
            pressure: BASELINE_PRESSURE_KPA + (pressure_draw - 0.5),
            gas: round2(snapshot.gas_level),
        }
    }
}

/// Bounded, append-only trend log.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Log pre-seeded with [`BACKFILL_POINTS`] ambient readings ending at `now`.
    pub fn backfilled<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let mut log = Self::new();
        for i in (0..BACKFILL_POINTS as i64).rev() {
            let at = now - Duration::seconds(i * BACKFILL_SPACING_SECS);
            let temperature: f64 = 24.0 + rng.random::<f64>() * 2.0;
            let gas: f64 = 5.0 + rng.random::<f64>() * 2.0;
            log.push(HistoryPoint {
                time: at.format("%H:%M").to_string(),
                timestamp: at.timestamp_millis(),
                temperature,
                pressure: BASELINE_PRESSURE_KPA,
                gas,
            });
        }
        log
    }

    /// Append a point, evicting the oldest beyond capacity.
    pub fn push(&mut self, point: HistoryPoint) {
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        debug!(
            temperature = point.temperature,
            gas = point.gas,
            len = self.points.len() + 1,
            "history point recorded"
        );
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    /// Owned copy of the points, oldest first.
    pub fn points(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        let first = self.points.front()?;
        let last = self.points.back()?;
        Some(HistorySummary {
            count: self.points.len(),
            first_timestamp: first.timestamp,
            last_timestamp: last.timestamp,
            temperature: SeriesStats::from_values(self.points.iter().map(|p| p.temperature)),
            gas: SeriesStats::from_values(self.points.iter().map(|p| p.gas)),
            pressure: SeriesStats::from_values(self.points.iter().map(|p| p.pressure)),
        })
    }

    /// Printable report of the whole log.
    pub fn report(&self, generated_at: DateTime<Utc>) -> HistoryReport {
        HistoryReport {
            report_id: Uuid::new_v4(),
            generated_at,
            summary: self.summary(),
            points: self.points(),
        }
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Min / max / mean of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SeriesStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }
        if count == 0 {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        Self {
            min,
            max,
            mean: sum / count as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub count: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub temperature: SeriesStats,
    pub gas: SeriesStats,
    pub pressure: SeriesStats,
}

/// Exported trend report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryReport {
    /// Identifier printed on the report header.
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: Option<HistorySummary>,
    pub points: Vec<HistoryPoint>,
}

impl HistoryReport {
    /// Short upper-case identifier for the printed header.
    pub fn short_id(&self) -> String {
        self.report_id.simple().to_string()[..8].to_uppercase()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::state::TelemetryState;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn point(ts: i64, temperature: f64, gas: f64) -> HistoryPoint {
        HistoryPoint {
            time: String::new(),
            timestamp: ts,
            temperature,
            pressure: BASELINE_PRESSURE_KPA,
            gas,
        }
    }

    #[test]
    fn sample_rounds_to_two_decimals() {
        let snap = TelemetryState::new(24.56789, 5.23456, 600.0).snapshot();
        let p = HistoryPoint::sample(&snap, at(0), 0.5);
        assert_eq!(p.temperature, 24.57);
        assert_eq!(p.gas, 5.23);
        assert_eq!(p.pressure, BASELINE_PRESSURE_KPA);
        assert_eq!(p.timestamp, at(0).timestamp_millis());
        assert_eq!(p.time.len(), "HH:MM:SS".len());
    }

    #[test]
    fn log_caps_at_capacity_keeping_newest() {
        let mut log = HistoryLog::new();
        for i in 0..250 {
            log.push(point(i, 25.0, 5.0));
        }
        assert_eq!(log.len(), HISTORY_CAPACITY);
        assert_eq!(log.iter().next().unwrap().timestamp, 250 - HISTORY_CAPACITY as i64);
        assert_eq!(log.latest().unwrap().timestamp, 249);
    }

    #[test]
    fn backfill_seeds_quiet_readings() {
        let mut rng = StdRng::seed_from_u64(3);
        let log = HistoryLog::backfilled(at(1_000), &mut rng);
        assert_eq!(log.len(), BACKFILL_POINTS);
        assert_eq!(log.latest().unwrap().timestamp, at(1_000).timestamp_millis());
        for p in log.iter() {
            assert!((24.0..26.0).contains(&p.temperature));
            assert!((5.0..7.0).contains(&p.gas));
        }
        let stamps: Vec<_> = log.iter().map(|p| p.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[1] - w[0] == 10_000));
    }

    #[test]
    fn summary_of_empty_log_is_none() {
        assert!(HistoryLog::new().summary().is_none());
    }

    #[test]
    fn summary_statistics() {
        let mut log = HistoryLog::new();
        log.push(point(1, 20.0, 10.0));
        log.push(point(2, 30.0, 20.0));
        log.push(point(3, 40.0, 60.0));

        let summary = log.summary().unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.first_timestamp, 1);
        assert_eq!(summary.last_timestamp, 3);
        assert_eq!(summary.temperature.min, 20.0);
        assert_eq!(summary.temperature.max, 40.0);
        assert!((summary.temperature.mean - 30.0).abs() < 1e-9);
        assert!((summary.gas.mean - 30.0).abs() < 1e-9);
    }

    #[test]
    fn report_carries_all_points() {
        let mut log = HistoryLog::with_capacity(5);
        for i in 0..3 {
            log.push(point(i, 25.0, 5.0));
        }
        let report = log.report(at(0));
        assert_eq!(report.points.len(), 3);
        assert_eq!(report.short_id().len(), 8);
        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("report_id"));
        assert!(json.contains("\"points\""));
    }
}
