//! Data carried through the pipeline.

use crate::Complex32;
use serde::{Deserialize, Serialize};

/// Window function applied before the FFT. Chosen once at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// No tapering; coherent gain of exactly 1.0.
    Rectangular,
    /// Raised cosine.
    #[default]
    Hann,
    /// 4-term Blackman-Harris.
    BlackmanHarris,
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WindowKind::Rectangular => "rectangular",
            WindowKind::Hann => "hann",
            WindowKind::BlackmanHarris => "blackman_harris",
        };
        f.write_str(label)
    }
}

/// One acquisition cycle's worth of samples, one vector per channel.
///
/// Every channel holds the same number of samples. `timestamp` is the hardware
/// time of the first sample in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    /// Per-channel sample vectors.
    pub channels: Vec<Vec<Complex32>>,
    /// Hardware timestamp of the first sample, seconds.
    pub timestamp: f64,
}

impl SampleBlock {
    /// Single-channel block.
    pub fn single(samples: Vec<Complex32>, timestamp: f64) -> Self {
        Self {
            channels: vec![samples],
            timestamp,
        }
    }

    /// Samples per channel (length of the shortest channel).
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// True when no channel carries samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Primary channel samples.
    #[must_use]
    pub fn primary(&self) -> &[Complex32] {
        self.channels.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Flag bits carried in encoded frame headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags {
    /// Reference clock locked to GPS.
    pub gps_locked: bool,
    /// Front end reported an overflow since the previous frame.
    pub overflow: bool,
}

impl FrameFlags {
    /// GPS lock bit.
    pub const GPS_LOCKED: u16 = 1 << 0;
    /// Overflow bit.
    pub const OVERFLOW: u16 = 1 << 1;

    /// Packed bit representation.
    #[must_use]
    pub fn bits(self) -> u16 {
        let mut bits = 0;
        if self.gps_locked {
            bits |= Self::GPS_LOCKED;
        }
        if self.overflow {
            bits |= Self::OVERFLOW;
        }
        bits
    }

    /// Decode from packed bits; unknown bits are ignored.
    #[must_use]
    pub fn from_bits(bits: u16) -> Self {
        Self {
            gps_locked: bits & Self::GPS_LOCKED != 0,
            overflow: bits & Self::OVERFLOW != 0,
        }
    }
}

/// Spectrum and peak descriptor of one channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSpectrum {
    /// Log power per bin in dB, shifted so bin 0 is the most negative offset.
    pub spectrum: Vec<f32>,
    /// Bin holding the maximum power.
    pub peak_bin: i16,
    /// Power of the peak bin in dB.
    pub peak_power: f32,
}

/// One computed power spectrum plus metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumFrame {
    /// Monotonic frame counter.
    pub frame_number: u64,
    /// Hardware timestamp of the source block, seconds.
    pub timestamp: f64,
    /// Tuned center frequency in Hz at the time of capture.
    pub center_freq: f64,
    /// Sample rate in samples per second.
    pub sample_rate: f64,
    /// FFT size (bins per channel).
    pub fft_size: u32,
    /// Lock and overflow flags.
    pub flags: FrameFlags,
    /// Per-channel results. Never longer than [`MAX_CHANNELS`](crate::limits::MAX_CHANNELS).
    pub channels: Vec<ChannelSpectrum>,
}

impl SpectrumFrame {
    /// Frame with `channel_count` zeroed spectra of `fft_size` bins.
    pub fn with_shape(fft_size: usize, channel_count: usize) -> Self {
        Self {
            fft_size: fft_size as u32,
            channels: (0..channel_count)
                .map(|_| ChannelSpectrum {
                    spectrum: vec![0.0; fft_size],
                    ..ChannelSpectrum::default()
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Number of channels carried.
    #[must_use]
    pub fn channel_count(&self) -> u8 {
        self.channels.len() as u8
    }

    /// The channel carried by the text and binary encodings.
    #[must_use]
    pub fn primary(&self) -> Option<&ChannelSpectrum> {
        self.channels.first()
    }
}
