//! Daemon configuration.
//!
//! Layering, lowest priority first:
//!
//! 1. Built-in defaults ([`SdrConfig::default`])
//! 2. TOML file at `$SDR_CONFIG`, or `config/sdr.toml` when that variable is unset.
//!    A missing file is skipped.
//! 3. Environment variables prefixed `SDR_`, nested with `__`
//!    (`SDR_RADIO__FREQUENCY=2.4e9`, `SDR_OUTPUT__MODE=shm`).
//!
//! Durations are human readable (`"500ms"`, `"10s"`).
//!
//! # Example
//!
//! ```toml
//! mode = "stream"
//!
//! [radio]
//! frequency = 915e6
//! sample_rate = 10e6
//! gain = 50.0
//!
//! [spectrum]
//! fft_size = 2048
//! window = "blackman_harris"
//!
//! [output]
//! mode = "shm"
//! ring_size = 64
//!
//! [acquisition]
//! status_interval = "10s"
//! ```

use crate::error::{Result, SdrError};
use crate::limits;
use crate::types::WindowKind;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SDR_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/sdr.toml";

/// Environment override prefix.
pub const ENV_PREFIX: &str = "SDR_";

/// Radio tuning at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    /// Center frequency, Hz.
    pub frequency: f64,
    /// Sample rate, samples per second.
    pub sample_rate: f64,
    /// Receive gain, dB.
    pub gain: f64,
    /// Analog bandwidth, Hz. Left at the hardware default when unset.
    pub bandwidth: Option<f64>,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            frequency: 915e6,
            sample_rate: 10e6,
            gain: 50.0,
            bandwidth: None,
        }
    }
}

/// FFT engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumSettings {
    /// Points per FFT; also the block length requested from the front end.
    pub fft_size: usize,
    /// Window applied before the transform.
    pub window: WindowKind,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            window: WindowKind::Hann,
        }
    }
}

/// Where spectrum frames go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Line-delimited JSON records on stdout.
    #[default]
    Text,
    /// Packed binary header plus spectrum floats on stdout.
    Binary,
    /// Shared-memory ring.
    Shm,
}

/// Output sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Sink selection.
    pub mode: OutputMode,
    /// Directory backing the shared region.
    pub shm_dir: PathBuf,
    /// Region name inside `shm_dir`.
    pub shm_name: String,
    /// Number of frame slots in the ring.
    pub ring_size: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            mode: OutputMode::Text,
            shm_dir: PathBuf::from(limits::DEFAULT_SHM_DIR),
            shm_name: limits::DEFAULT_SHM_NAME.to_string(),
            ring_size: limits::DEFAULT_RING_SIZE,
        }
    }
}

impl OutputSettings {
    /// Full path of the shared region.
    #[must_use]
    pub fn shm_path(&self) -> PathBuf {
        self.shm_dir.join(&self.shm_name)
    }
}

/// Raw IQ recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Output file. Recording is disabled when unset.
    pub path: Option<PathBuf>,
    /// Samples per pooled write block.
    pub block_samples: usize,
    /// Number of pre-allocated write blocks.
    pub pool_blocks: usize,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            path: None,
            block_samples: 65_536,
            pool_blocks: 32,
        }
    }
}

/// Control socket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Run the control plane server.
    pub enabled: bool,
    /// Filesystem path of the stream socket.
    pub socket_path: PathBuf,
    /// Accept-loop poll interval.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: PathBuf::from(limits::DEFAULT_CONTROL_SOCKET),
            poll_interval: limits::CONTROL_POLL_INTERVAL,
        }
    }
}

/// Acquisition loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Bounded wait for one block.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Interval between status records.
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: limits::DEFAULT_FETCH_TIMEOUT,
            status_interval: limits::DEFAULT_STATUS_INTERVAL,
            max_frames: None,
        }
    }
}

/// Top-level operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Continuous spectrum streaming.
    #[default]
    Stream,
    /// One frequency sweep with signal detection.
    Scan,
}

/// Sweep scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// First center frequency, Hz.
    pub start: f64,
    /// Last center frequency (inclusive), Hz.
    pub stop: f64,
    /// Step between centers, Hz.
    pub step: f64,
    /// Averaging time at each step.
    #[serde(with = "humantime_serde")]
    pub dwell: Duration,
    /// Wait after retuning before collecting.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    /// Detection threshold, dB.
    pub threshold_db: f32,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            start: 88e6,
            stop: 108e6,
            step: 1e6,
            dwell: Duration::from_millis(100),
            settle: Duration::from_millis(50),
            threshold_db: -80.0,
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdrConfig {
    /// Operating mode.
    pub mode: RunMode,
    /// Startup tuning.
    pub radio: RadioSettings,
    /// Engine settings.
    pub spectrum: SpectrumSettings,
    /// Frame sink.
    pub output: OutputSettings,
    /// Raw sample recording.
    pub recording: RecordingSettings,
    /// Control plane.
    pub control: ControlSettings,
    /// Acquisition loop.
    pub acquisition: AcquisitionSettings,
    /// Sweep scanner.
    pub scanner: ScannerSettings,
}

impl SdrConfig {
    /// Load from the default file location plus environment, then validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load with `path` as the file layer, then validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_figment(Self::figment(path))
    }

    /// Provider stack without extraction.
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(SdrConfig::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults/env");
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract from an arbitrary provider stack, then validate.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: SdrConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject semantically invalid values.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> Result<()> {
            Err(SdrError::Configuration(msg))
        }

        if !limits::is_valid_fft_size(self.spectrum.fft_size) {
            return invalid(format!(
                "spectrum.fft_size {} must be a power of two in [{}, {}]",
                self.spectrum.fft_size,
                limits::MIN_FFT_SIZE,
                limits::MAX_FFT_SIZE
            ));
        }
        if self.output.ring_size < limits::MIN_RING_SIZE {
            return invalid(format!(
                "output.ring_size {} must be at least {}",
                self.output.ring_size,
                limits::MIN_RING_SIZE
            ));
        }
        if self.output.shm_name.is_empty() || self.output.shm_name.contains('/') {
            return invalid(format!(
                "output.shm_name '{}' must be a plain file name",
                self.output.shm_name
            ));
        }
        for (name, value) in [
            ("radio.frequency", self.radio.frequency),
            ("radio.sample_rate", self.radio.sample_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }
        if !self.radio.gain.is_finite() {
            return invalid("radio.gain must be finite".to_string());
        }
        if let Some(bw) = self.radio.bandwidth {
            if !(bw.is_finite() && bw > 0.0) {
                return invalid(format!("radio.bandwidth must be positive, got {}", bw));
            }
        }
        if self.recording.block_samples == 0 || self.recording.pool_blocks == 0 {
            return invalid("recording.block_samples and recording.pool_blocks must be non-zero".to_string());
        }
        if self.acquisition.fetch_timeout.is_zero() {
            return invalid("acquisition.fetch_timeout must be non-zero".to_string());
        }
        if self.control.poll_interval.is_zero() {
            return invalid("control.poll_interval must be non-zero".to_string());
        }
        if self.mode == RunMode::Scan {
            let s = &self.scanner;
            if !(s.step.is_finite() && s.step > 0.0) {
                return invalid(format!("scanner.step must be positive, got {}", s.step));
            }
            if !(s.start > 0.0 && s.stop >= s.start) {
                return invalid(format!(
                    "scanner range [{}, {}] is empty or non-positive",
                    s.start, s.stop
                ));
            }
        }
        Ok(())
    }
}
