//! Metadata sidecar written next to a finished IQ recording.

use crate::block_writer::WriterStats;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sample format tag of recordings produced by [`BlockWriter`](crate::BlockWriter).
pub const DATATYPE_CF32_LE: &str = "cf32_le";

/// Descriptive metadata for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Sample encoding.
    pub datatype: String,
    /// Sample rate, samples per second.
    pub sample_rate: f64,
    /// Capture center frequency, Hz.
    pub frequency: f64,
    /// Wall-clock start of the capture.
    pub start_time: DateTime<Utc>,
    /// Samples actually written.
    pub samples_written: u64,
    /// Blocks lost to pool exhaustion; each is a gap in the file.
    pub dropped_blocks: u64,
    /// Front end that produced the samples.
    pub hardware: String,
}

impl RecordingMetadata {
    /// Metadata for a capture that started at `start_time`.
    pub fn new(
        sample_rate: f64,
        frequency: f64,
        start_time: DateTime<Utc>,
        hardware: impl Into<String>,
    ) -> Self {
        Self {
            datatype: DATATYPE_CF32_LE.to_string(),
            sample_rate,
            frequency,
            start_time,
            samples_written: 0,
            dropped_blocks: 0,
            hardware: hardware.into(),
        }
    }

    /// Fill in the final writer counters.
    #[must_use]
    pub fn with_stats(mut self, stats: &WriterStats) -> Self {
        self.samples_written = stats.samples_written;
        self.dropped_blocks = stats.dropped_blocks;
        self
    }

    /// `<recording>.meta.json`
    #[must_use]
    pub fn sidecar_path(recording: &Path) -> PathBuf {
        let mut name = recording.as_os_str().to_os_string();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    /// Write the sidecar for `recording`, returning its path.
    pub fn write_sidecar(&self, recording: &Path) -> Result<PathBuf> {
        let path = Self::sidecar_path(recording);
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), samples = self.samples_written, "recording metadata written");
        Ok(path)
    }

    /// Read a sidecar back.
    pub fn read_sidecar(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
