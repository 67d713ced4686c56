//! Window/FFT spectrum engine.
//!
//! Converts one sample block into a shifted log-power spectrum and a peak
//! descriptor per channel. The FFT plan, the work buffer and the scratch space
//! are allocated once in [`SpectrumEngine::new`] and reused for every call.
//!
//! Per bin:
//!
//! ```text
//! power = |X|² / N² / coherent_gain²
//! dB    = 10·log10(power + 1e-20)
//! ```
//!
//! Bins are circularly shifted so output bin 0 is the most negative frequency
//! offset and bin `N/2` is the tuned center.

use crate::error::{DspError, Result};
use crate::window::Window;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use sdr_core::limits::{self, POWER_FLOOR};
use sdr_core::{ChannelSpectrum, Complex32, SampleBlock, SpectrumFrame, WindowKind};
use std::sync::Arc;

/// Reusable FFT engine for a fixed size and window.
pub struct SpectrumEngine {
    fft_size: usize,
    window: Window,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// `1 / (N² · cg²)`
    scale: f64,
}

impl std::fmt::Debug for SpectrumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumEngine")
            .field("fft_size", &self.fft_size)
            .field("window", &self.window.kind())
            .field("coherent_gain", &self.window.coherent_gain())
            .finish()
    }
}

impl SpectrumEngine {
    /// Plan a forward FFT of `fft_size` points with `window`.
    pub fn new(fft_size: usize, window: WindowKind) -> Result<Self> {
        if !limits::is_valid_fft_size(fft_size) {
            return Err(DspError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window = Window::new(window, fft_size);

        let n = fft_size as f64;
        let cg = window.coherent_gain();
        let scale = 1.0 / (n * n * cg * cg);

        tracing::debug!(
            fft_size,
            window = %window.kind(),
            coherent_gain = cg,
            "spectrum engine planned"
        );

        Ok(Self {
            fft_size,
            window,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            scale,
        })
    }

    /// Configured FFT size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Window in use.
    #[must_use]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Compute one channel into `out`, reusing its spectrum allocation.
    pub fn compute_channel(&mut self, samples: &[Complex32], out: &mut ChannelSpectrum) -> Result<()> {
        if samples.len() != self.fft_size {
            return Err(DspError::LengthMismatch {
                expected: self.fft_size,
                actual: samples.len(),
            });
        }

        for ((dst, &s), &w) in self
            .buffer
            .iter_mut()
            .zip(samples)
            .zip(self.window.coefficients())
        {
            *dst = s * w;
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let n = self.fft_size;
        let half = n / 2;
        out.spectrum.resize(n, 0.0);

        let mut peak_bin = 0usize;
        let mut peak_power = f32::NEG_INFINITY;
        for (i, x) in self.buffer.iter().enumerate() {
            let re = f64::from(x.re);
            let im = f64::from(x.im);
            let power = (re * re + im * im) * self.scale;
            let db = (10.0 * (power + POWER_FLOOR).log10()) as f32;
            let shifted = (i + half) % n;
            out.spectrum[shifted] = db;
            if db > peak_power || (db == peak_power && shifted < peak_bin) {
                peak_power = db;
                peak_bin = shifted;
            }
        }

        // fft_size <= MAX_FFT_SIZE keeps every shifted index within i16
        out.peak_bin = peak_bin as i16;
        out.peak_power = peak_power;
        Ok(())
    }

    /// Compute every channel of `block` into `frame`.
    ///
    /// `frame.channels` is resized to the block's channel count (capped at
    /// [`MAX_CHANNELS`](limits::MAX_CHANNELS)); existing spectrum buffers are reused.
    pub fn compute(&mut self, block: &SampleBlock, frame: &mut SpectrumFrame) -> Result<()> {
        let channels = block.channel_count().min(limits::MAX_CHANNELS);
        if channels == 0 {
            return Err(DspError::LengthMismatch {
                expected: self.fft_size,
                actual: 0,
            });
        }
        frame.channels.resize_with(channels, ChannelSpectrum::default);
        frame.fft_size = self.fft_size as u32;
        frame.timestamp = block.timestamp;

        for (samples, out) in block.channels.iter().zip(frame.channels.iter_mut()) {
            self.compute_channel(samples, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(n: usize, freq: f64, rate: f64, amplitude: f32) -> Vec<Complex32> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * freq * i as f64 / rate;
                Complex32::new(
                    amplitude * phase.cos() as f32,
                    amplitude * phase.sin() as f32,
                )
            })
            .collect()
    }

    #[test]
    fn test_zero_input_hits_floor_for_every_window() {
        let floor = (10.0 * POWER_FLOOR.log10()) as f32;
        for kind in [
            WindowKind::Rectangular,
            WindowKind::Hann,
            WindowKind::BlackmanHarris,
        ] {
            let mut engine = SpectrumEngine::new(1024, kind).unwrap();
            let mut out = ChannelSpectrum::default();
            engine
                .compute_channel(&vec![Complex32::new(0.0, 0.0); 1024], &mut out)
                .unwrap();
            assert_eq!(out.spectrum.len(), 1024);
            assert!(out.spectrum.iter().all(|&v| v == floor));
            assert!(out.spectrum.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_tone_peak_location() {
        let rate = 10e6;
        let f0 = 1.234e6;
        for n in [1024usize, 2048, 4096] {
            for kind in [
                WindowKind::Rectangular,
                WindowKind::Hann,
                WindowKind::BlackmanHarris,
            ] {
                let mut engine = SpectrumEngine::new(n, kind).unwrap();
                let mut out = ChannelSpectrum::default();
                engine
                    .compute_channel(&tone(n, f0, rate, 0.5), &mut out)
                    .unwrap();
                let offset = i64::from(out.peak_bin) - (n / 2) as i64;
                let expected = f0 * n as f64 / rate;
                assert!(
                    (offset as f64 - expected).abs() <= 1.0,
                    "n={} window={} offset={} expected={}",
                    n,
                    kind,
                    offset,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_negative_offset_lands_below_center() {
        let n = 2048;
        let rate = 10e6;
        let mut engine = SpectrumEngine::new(n, WindowKind::Hann).unwrap();
        let mut out = ChannelSpectrum::default();
        engine
            .compute_channel(&tone(n, -2e6, rate, 1.0), &mut out)
            .unwrap();
        let expected = (n / 2) as f64 - 2e6 * n as f64 / rate;
        assert!((f64::from(out.peak_bin) - expected).abs() <= 1.0);
    }

    #[test]
    fn test_bin_centered_tone_reads_amplitude_in_db() {
        // unit-amplitude tone exactly on a bin: power 1.0 -> 0 dB after gain correction
        let n = 1024;
        let rate = 1024.0;
        for kind in [WindowKind::Rectangular, WindowKind::Hann] {
            let mut engine = SpectrumEngine::new(n, kind).unwrap();
            let mut out = ChannelSpectrum::default();
            engine
                .compute_channel(&tone(n, 100.0, rate, 1.0), &mut out)
                .unwrap();
            assert_eq!(out.peak_bin, (n / 2 + 100) as i16);
            assert!(out.peak_power.abs() < 0.1, "{} -> {}", kind, out.peak_power);
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut engine = SpectrumEngine::new(1024, WindowKind::Hann).unwrap();
        let mut out = ChannelSpectrum::default();
        let err = engine
            .compute_channel(&vec![Complex32::new(0.0, 0.0); 1000], &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            DspError::LengthMismatch {
                expected: 1024,
                actual: 1000
            }
        ));
    }

    #[test]
    fn test_invalid_size_rejected() {
        assert!(SpectrumEngine::new(1000, WindowKind::Hann).is_err());
        assert!(SpectrumEngine::new(8, WindowKind::Hann).is_err());
    }

    #[test]
    fn test_compute_fills_all_channels() {
        let n = 256;
        let mut engine = SpectrumEngine::new(n, WindowKind::Hann).unwrap();
        let block = SampleBlock {
            channels: vec![tone(n, 10.0, 256.0, 1.0), tone(n, -20.0, 256.0, 1.0)],
            timestamp: 1.5,
        };
        let mut frame = SpectrumFrame::with_shape(n, 1);
        engine.compute(&block, &mut frame).unwrap();
        assert_eq!(frame.channel_count(), 2);
        assert_eq!(frame.timestamp, 1.5);
        assert_eq!(frame.channels[0].peak_bin, (n / 2 + 10) as i16);
        assert_eq!(frame.channels[1].peak_bin, (n / 2 - 20) as i16);
    }
}
