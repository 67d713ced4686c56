//! Threshold signal detection over averaged spectra.

use serde::Serialize;

/// One contiguous run of bins above the detection threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Estimated center frequency of the run, Hz.
    pub frequency: f64,
    /// Highest power inside the run, dB.
    pub peak_power: f32,
    /// Run width, Hz.
    pub bandwidth: f64,
    /// First bin above threshold.
    pub start_bin: usize,
    /// First bin back at or below threshold.
    pub end_bin: usize,
}

/// Find runs above `threshold_db` in a shifted dB spectrum.
///
/// The outermost bins are excluded. A run still open at the last inspected bin
/// is not reported.
#[must_use]
pub fn detect_signals(
    spectrum: &[f32],
    center_freq: f64,
    sample_rate: f64,
    threshold_db: f32,
) -> Vec<Detection> {
    let n = spectrum.len();
    let mut detections = Vec::new();
    if n < 3 {
        return detections;
    }
    let bin_hz = sample_rate / n as f64;

    let mut run: Option<(usize, f32)> = None;
    for (i, &value) in spectrum.iter().enumerate().take(n - 1).skip(1) {
        match run {
            None if value > threshold_db => run = Some((i, value)),
            None => {}
            Some((start, peak)) => {
                let peak = peak.max(value);
                if value <= threshold_db {
                    let mid = (start + i) / 2;
                    detections.push(Detection {
                        frequency: center_freq + (mid as f64 - n as f64 / 2.0) * bin_hz,
                        peak_power: peak,
                        bandwidth: (i - start) as f64 * bin_hz,
                        start_bin: start,
                        end_bin: i,
                    });
                    run = None;
                } else {
                    run = Some((start, peak));
                }
            }
        }
    }
    detections
}

/// Running mean of equally sized dB spectra.
#[derive(Debug, Clone)]
pub struct SpectrumAverager {
    sum: Vec<f64>,
    count: usize,
}

impl SpectrumAverager {
    /// Averager for spectra of `len` bins.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            sum: vec![0.0; len],
            count: 0,
        }
    }

    /// Accumulate one spectrum. Spectra of the wrong length are ignored.
    pub fn add(&mut self, spectrum: &[f32]) -> bool {
        if spectrum.len() != self.sum.len() {
            return false;
        }
        for (acc, &v) in self.sum.iter_mut().zip(spectrum) {
            *acc += f64::from(v);
        }
        self.count += 1;
        true
    }

    /// Spectra accumulated so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean spectrum, or `None` when nothing was accumulated.
    #[must_use]
    pub fn mean(&self) -> Option<Vec<f32>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(self.sum.iter().map(|&s| (s / n) as f32).collect())
    }

    /// Clear for the next dwell.
    pub fn reset(&mut self) {
        self.sum.iter_mut().for_each(|s| *s = 0.0);
        self.count = 0;
    }
}
