use crate::types::{TelemetrySample, Waypoint, HEAT_ACTIVE_THRESHOLD};
use chrono::NaiveTime;
use log::debug;
use serde::{Deserialize, Serialize};

/// `HH:MM:SS` for a number of seconds, wrapping at 24 hours. Negative input
/// reads as zero.
pub fn format_clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        (seconds.trunc() as u64 % 86_400) as u32
    } else {
        0
    };
    NaiveTime::from_num_seconds_from_midnight_opt(whole, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".to_string())
}

/// Steady-state status report from the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub state: String,
    #[serde(default)]
    pub runtime: f64,
    #[serde(default)]
    pub totaltime: f64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub heat: f64,
}

impl DeviceStatus {
    pub fn sample(&self) -> TelemetrySample {
        TelemetrySample::new(self.runtime, self.temperature, Some(self.target))
    }

    pub fn is_heating(&self) -> bool {
        self.heat > HEAT_ACTIVE_THRESHOLD
    }
}

/// Progress view of the current firing, computed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    /// Percentage in `[0, 100]`.
    pub percent: f64,
    pub elapsed: String,
    pub remaining: String,
    pub temperature: f64,
    pub target: f64,
    pub heating: bool,
}

impl RunProgress {
    pub fn from_status(status: &DeviceStatus) -> Self {
        Self {
            percent: progress_percent(status.runtime, status.totaltime),
            elapsed: format_clock(status.runtime),
            remaining: format_clock((status.totaltime - status.runtime).max(0.0)),
            temperature: status.temperature,
            target: status.target,
            heating: status.is_heating(),
        }
    }
}

pub fn progress_percent(runtime: f64, totaltime: f64) -> f64 {
    if totaltime <= 0.0 || !runtime.is_finite() || !totaltime.is_finite() {
        return 0.0;
    }
    (runtime / totaltime * 100.0).clamp(0.0, 100.0)
}

/// Immutable copy of the live series for a chart renderer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiveSnapshot {
    pub measured: Vec<Waypoint>,
    pub target: Vec<Waypoint>,
}

/// Append-only live series of the current firing.
#[derive(Debug, Default)]
pub struct TelemetryAggregator {
    samples: Vec<TelemetrySample>,
}

impl TelemetryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sample: TelemetrySample) {
        self.samples.push(sample);
    }

    pub fn reset(&mut self) {
        debug!("Live series reset ({} samples dropped)", self.samples.len());
        self.samples.clear();
    }

    /// Backlog samples go in exactly in the order received.
    pub fn replay_backlog<I>(&mut self, samples: I) -> usize
    where
        I: IntoIterator<Item = TelemetrySample>,
    {
        let before = self.samples.len();
        self.samples.extend(samples);
        let replayed = self.samples.len() - before;
        debug!("Replayed {} backlog samples", replayed);
        replayed
    }

    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            measured: self
                .samples
                .iter()
                .map(|s| Waypoint::new(s.runtime, s.temperature))
                .collect(),
            target: self
                .samples
                .iter()
                .filter_map(|s| s.target.map(|t| Waypoint::new(s.runtime, t)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_then_live_keeps_receipt_order() {
        let mut aggregator = TelemetryAggregator::new();
        let backlog = vec![
            TelemetrySample::new(0.0, 20.0, Some(25.0)),
            TelemetrySample::new(10.0, 22.0, Some(30.0)),
            TelemetrySample::new(20.0, 25.0, Some(35.0)),
        ];
        assert_eq!(aggregator.replay_backlog(backlog), 3);

        for i in 0..4 {
            aggregator.append(TelemetrySample::new(30.0 + i as f64, 26.0, None));
        }

        assert_eq!(aggregator.len(), 7);
        let runtimes: Vec<f64> = aggregator.samples().iter().map(|s| s.runtime).collect();
        assert_eq!(runtimes, vec![0.0, 10.0, 20.0, 30.0, 31.0, 32.0, 33.0]);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.measured.len(), 7);
        assert_eq!(snapshot.target.len(), 3);

        aggregator.reset();
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(progress_percent(50.0, 200.0), 25.0);
        assert_eq!(progress_percent(300.0, 200.0), 100.0);
        assert_eq!(progress_percent(-5.0, 200.0), 0.0);
        assert_eq!(progress_percent(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_run_progress_view() {
        let status = DeviceStatus {
            state: "RUNNING".to_string(),
            runtime: 3661.0,
            totaltime: 3600.0,
            temperature: 812.4,
            target: 820.0,
            heat: 1.0,
        };
        let progress = RunProgress::from_status(&status);

        assert_eq!(progress.percent, 100.0);
        assert_eq!(progress.elapsed, "01:01:01");
        assert_eq!(progress.remaining, "00:00:00");
        assert!(progress.heating);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(1092.0), "00:18:12");
        assert_eq!(format_clock(-3.0), "00:00:00");
    }
}
