//! Simulated radio front end.
//!
//! Produces a phase-continuous complex tone plus seeded uniform noise on every
//! channel. Capability ranges resemble a wideband direct-conversion transceiver.

use crate::faults::{Fault, FaultScript};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sdr_core::{
    CapabilityRange, Complex32, FrontEndError, FrontEndErrorKind, RadioFrontEnd, RadioParameter,
    SampleBlock, SensorReadings,
};
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

/// Tunable center frequency range, Hz.
pub const FREQUENCY_RANGE: CapabilityRange = CapabilityRange {
    min: 70e6,
    max: 6e9,
};
/// Sample rate range, S/s.
pub const SAMPLE_RATE_RANGE: CapabilityRange = CapabilityRange {
    min: 200e3,
    max: 61.44e6,
};
/// Gain range, dB.
pub const GAIN_RANGE: CapabilityRange = CapabilityRange { min: 0.0, max: 76.0 };
/// Analog bandwidth range, Hz.
pub const BANDWIDTH_RANGE: CapabilityRange = CapabilityRange {
    min: 200e3,
    max: 56e6,
};

/// Mock front end.
#[derive(Debug)]
pub struct MockRadio {
    name: String,
    ready: bool,
    channels: usize,
    frequency: f64,
    sample_rate: f64,
    gain: f64,
    bandwidth: f64,
    tone_offset: f64,
    tone_amplitude: f32,
    noise_amplitude: f32,
    rng: ChaCha8Rng,
    phase: f64,
    block_len: Option<usize>,
    block_index: u64,
    timestamp: f64,
    paced: bool,
    next_due: Option<Instant>,
    faults: FaultScript,
    temperature_c: f64,
    gps_locked: bool,
}

impl MockRadio {
    /// Single-channel mock with a tone 1 MHz above center and a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            name: "mock".into(),
            ready: true,
            channels: 1,
            frequency: 915e6,
            sample_rate: 10e6,
            gain: 50.0,
            bandwidth: 10e6,
            tone_offset: 1e6,
            tone_amplitude: 0.5,
            noise_amplitude: 0.01,
            rng: ChaCha8Rng::seed_from_u64(seed),
            phase: 0.0,
            block_len: None,
            block_index: 0,
            timestamp: 0.0,
            paced: false,
            next_due: None,
            faults: FaultScript::none(),
            temperature_c: 42.0,
            gps_locked: false,
        }
    }

    /// Device name reported in logs and metadata.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of receive channels (clamped to at least one).
    #[must_use]
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Tone offset from center (Hz) and linear amplitude.
    #[must_use]
    pub fn with_tone(mut self, offset_hz: f64, amplitude: f32) -> Self {
        self.tone_offset = offset_hz;
        self.tone_amplitude = amplitude;
        self
    }

    /// Uniform noise amplitude per I/Q component.
    #[must_use]
    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Fault schedule.
    #[must_use]
    pub fn with_faults(mut self, faults: FaultScript) -> Self {
        self.faults = faults;
        self
    }

    /// Deliver blocks in real time at the configured sample rate.
    #[must_use]
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Report GPS lock.
    #[must_use]
    pub fn with_gps_lock(mut self, locked: bool) -> Self {
        self.gps_locked = locked;
        self
    }

    /// Simulate a device that never finishes initialising.
    #[must_use]
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Blocks fetched since the stream started, including failed fetches.
    #[must_use]
    pub fn blocks_fetched(&self) -> u64 {
        self.block_index
    }

    /// True while streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.block_len.is_some()
    }

    fn block_duration(&self, len: usize) -> Duration {
        Duration::from_secs_f64(len as f64 / self.sample_rate)
    }

    fn pace(&mut self, len: usize) {
        if !self.paced {
            return;
        }
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + self.block_duration(len));
    }

    fn synthesize(&mut self, len: usize) -> SampleBlock {
        let step = TAU * self.tone_offset / self.sample_rate;
        let start_phase = self.phase;
        let noise = self.noise_amplitude;

        let channels = (0..self.channels)
            .map(|c| {
                let offset = c as f64 * std::f64::consts::FRAC_PI_4;
                (0..len)
                    .map(|k| {
                        let theta = start_phase + offset + step * k as f64;
                        let tone = Complex32::from_polar(self.tone_amplitude, theta as f32);
                        let jitter = if noise > 0.0 {
                            Complex32::new(
                                self.rng.gen_range(-noise..=noise),
                                self.rng.gen_range(-noise..=noise),
                            )
                        } else {
                            Complex32::new(0.0, 0.0)
                        };
                        tone + jitter
                    })
                    .collect()
            })
            .collect();

        self.phase = (start_phase + step * len as f64) % TAU;
        let block = SampleBlock {
            channels,
            timestamp: self.timestamp,
        };
        self.timestamp += len as f64 / self.sample_rate;
        block
    }

    fn range_for(param: RadioParameter) -> CapabilityRange {
        match param {
            RadioParameter::Frequency => FREQUENCY_RANGE,
            RadioParameter::SampleRate => SAMPLE_RATE_RANGE,
            RadioParameter::Gain => GAIN_RANGE,
            RadioParameter::Bandwidth => BANDWIDTH_RANGE,
        }
    }
}

impl RadioFrontEnd for MockRadio {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn capability(&self, param: RadioParameter) -> CapabilityRange {
        Self::range_for(param)
    }

    fn set_parameter(&mut self, param: RadioParameter, value: f64) -> Result<f64, FrontEndError> {
        if !self.ready {
            return Err(FrontEndError::new(
                &self.name,
                FrontEndErrorKind::NotReady,
                "device not initialised",
            ));
        }
        let value = Self::range_for(param).check(&self.name, param, value)?;
        match param {
            RadioParameter::Frequency => self.frequency = value,
            RadioParameter::SampleRate => self.sample_rate = value,
            RadioParameter::Gain => self.gain = value,
            RadioParameter::Bandwidth => self.bandwidth = value,
        }
        tracing::debug!(device = %self.name, %param, value, "Mock parameter set");
        Ok(value)
    }

    fn start_stream(&mut self, block_len: usize) -> Result<(), FrontEndError> {
        if !self.ready {
            return Err(FrontEndError::new(
                &self.name,
                FrontEndErrorKind::NotReady,
                "device not initialised",
            ));
        }
        if block_len == 0 {
            return Err(FrontEndError::new(
                &self.name,
                FrontEndErrorKind::OutOfRange,
                "block length must be non-zero",
            ));
        }
        self.block_len = Some(block_len);
        self.block_index = 0;
        self.next_due = None;
        tracing::debug!(device = %self.name, block_len, "Mock stream started");
        Ok(())
    }

    fn get_block(&mut self, timeout: Duration) -> Result<SampleBlock, FrontEndError> {
        let Some(block_len) = self.block_len else {
            return Err(FrontEndError::new(
                &self.name,
                FrontEndErrorKind::NotReady,
                "stream not started",
            ));
        };

        let index = self.block_index;
        self.block_index += 1;

        match self.faults.fault_for(index) {
            Some(Fault::Timeout) => {
                if self.paced {
                    std::thread::sleep(timeout);
                }
                Err(FrontEndError::timeout(&self.name))
            }
            Some(Fault::Overflow) => {
                // lost samples still advance device time
                self.timestamp += block_len as f64 / self.sample_rate;
                Err(FrontEndError::overflow(&self.name))
            }
            Some(Fault::Fatal) => Err(FrontEndError::new(
                &self.name,
                FrontEndErrorKind::Fatal,
                "device disconnected",
            )),
            Some(Fault::ShortBlock(len)) => {
                let len = len.min(block_len);
                self.pace(len);
                Ok(self.synthesize(len))
            }
            Some(Fault::UnevenChannels(len)) => {
                self.pace(block_len);
                let mut block = self.synthesize(block_len);
                for channel in block.channels.iter_mut().skip(1) {
                    channel.resize(len, Complex32::new(0.0, 0.0));
                }
                Ok(block)
            }
            None => {
                self.pace(block_len);
                Ok(self.synthesize(block_len))
            }
        }
    }

    fn stop_stream(&mut self) -> Result<(), FrontEndError> {
        if self.block_len.take().is_some() {
            tracing::debug!(device = %self.name, blocks = self.block_index, "Mock stream stopped");
        }
        Ok(())
    }

    fn sensors(&self) -> SensorReadings {
        SensorReadings {
            temperature_c: Some(self.temperature_c + self.gain * 0.05),
            gps_locked: self.gps_locked,
        }
    }
}
