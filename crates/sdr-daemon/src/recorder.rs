//! Raw IQ recording: block writer plus metadata sidecar.

use crate::error::Result;
use chrono::{DateTime, Utc};
use sdr_core::{Complex32, RecordingSettings};
use sdr_storage::{BlockWriter, RecordingMetadata, WriterStats};
use std::path::{Path, PathBuf};

/// An open recording.
pub struct Recorder {
    path: PathBuf,
    writer: BlockWriter,
    hardware: String,
    capture: Option<(DateTime<Utc>, f64, f64)>,
}

impl Recorder {
    /// Create the recording file and start its writer thread.
    pub fn open(path: &Path, settings: &RecordingSettings, hardware: impl Into<String>) -> Result<Self> {
        let writer = BlockWriter::builder()
            .block_samples(settings.block_samples)
            .pool_blocks(settings.pool_blocks)
            .open(path)?;
        tracing::info!(path = %path.display(), "Recording to file");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            hardware: hardware.into(),
            capture: None,
        })
    }

    /// Mark the start of the capture with the tuning actually in effect.
    pub fn begin(&mut self, frequency: f64, sample_rate: f64) {
        self.capture = Some((Utc::now(), frequency, sample_rate));
    }

    /// Queue samples; returns how many were accepted.
    pub fn write(&self, samples: &[Complex32]) -> usize {
        self.writer.write(samples)
    }

    /// Current writer counters.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
        self.writer.stats()
    }

    /// Drain the writer and write the sidecar. A recording that never began
    /// streaming gets no sidecar.
    pub fn finish(self) -> Result<WriterStats> {
        let stats = self.writer.stop();
        if let Some((start, frequency, sample_rate)) = self.capture {
            RecordingMetadata::new(sample_rate, frequency, start, self.hardware)
                .with_stats(&stats)
                .write_sidecar(&self.path)?;
        }
        tracing::info!(
            path = %self.path.display(),
            samples = stats.samples_written,
            dropped_blocks = stats.dropped_blocks,
            "Recording closed"
        );
        Ok(stats)
    }
}
