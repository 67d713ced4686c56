//! Periodic status reporting.

use sdr_core::{SensorReadings, SharedParams};
use sdr_storage::WriterStats;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Recording counters included in a status record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    /// Samples persisted so far.
    pub samples_written: u64,
    /// Blocks lost to pool exhaustion.
    pub dropped_blocks: u64,
    /// Blocks waiting for the writer thread.
    pub queue_depth: usize,
}

/// One status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(rename = "type")]
    kind: &'static str,
    /// Frames produced.
    pub frames: u64,
    /// Front end overflow events.
    pub overflows: u64,
    /// Fetch timeouts.
    pub timeouts: u64,
    /// Board temperature, when available.
    pub temperature: Option<f64>,
    /// GPS lock state.
    pub gps_locked: bool,
    /// Current center frequency.
    pub frequency: f64,
    /// Current sample rate.
    pub sample_rate: f64,
    /// Current gain.
    pub gain: f64,
    /// Recording counters when a recording is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<RecordingStatus>,
}

impl StatusReport {
    /// Gather a report from the shared counters and fresh sensor readings.
    #[must_use]
    pub fn collect(
        params: &SharedParams,
        sensors: SensorReadings,
        recording: Option<WriterStats>,
    ) -> Self {
        let snap = params.snapshot();
        Self {
            kind: "status",
            frames: params.frames(),
            overflows: params.overflows(),
            timeouts: params.timeouts(),
            temperature: sensors.temperature_c,
            gps_locked: sensors.gps_locked,
            frequency: snap.frequency,
            sample_rate: snap.sample_rate,
            gain: snap.gain,
            recording: recording.map(|s| RecordingStatus {
                samples_written: s.samples_written,
                dropped_blocks: s.dropped_blocks,
                queue_depth: s.queue_depth,
            }),
        }
    }

    /// Log the report at info level.
    pub fn log(&self) {
        tracing::info!(
            frames = self.frames,
            overflows = self.overflows,
            timeouts = self.timeouts,
            temperature = ?self.temperature,
            gps_locked = self.gps_locked,
            frequency = self.frequency,
            dropped_blocks = self.recording.map(|r| r.dropped_blocks),
            "Status"
        );
    }
}

/// Fixed wall-clock interval timer.
#[derive(Debug)]
pub struct StatusTicker {
    interval: Duration,
    next: Instant,
}

impl StatusTicker {
    /// First tick is due one `interval` from now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// True once per elapsed interval. Missed ticks are not replayed.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.interval;
        true
    }
}
