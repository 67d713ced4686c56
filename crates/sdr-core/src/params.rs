//! Live tuning state shared between the control plane and the acquisition loop.
//!
//! Values are single-writer (control plane) / multi-reader (acquisition, status),
//! so plain atomics suffice. `f64` values are stored as their bit patterns.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Point-in-time copy of the shared parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    /// Center frequency, Hz.
    pub frequency: f64,
    /// Sample rate, samples per second.
    pub sample_rate: f64,
    /// Gain, dB.
    pub gain: f64,
    /// Analog bandwidth, Hz. Zero when left at the hardware default.
    pub bandwidth: f64,
    /// GPS lock state.
    pub gps_locked: bool,
}

#[derive(Debug)]
struct Inner {
    frequency: AtomicF64,
    sample_rate: AtomicF64,
    gain: AtomicF64,
    bandwidth: AtomicF64,
    gps_locked: AtomicBool,
    frames: AtomicU64,
    overflows: AtomicU64,
    timeouts: AtomicU64,
}

/// Cloneable handle to the shared parameter block.
#[derive(Debug, Clone)]
pub struct SharedParams {
    inner: Arc<Inner>,
}

impl SharedParams {
    /// New parameter block with initial values.
    #[must_use]
    pub fn new(frequency: f64, sample_rate: f64, gain: f64, bandwidth: f64) -> Self {
        Self {
            inner: Arc::new(Inner {
                frequency: AtomicF64::new(frequency),
                sample_rate: AtomicF64::new(sample_rate),
                gain: AtomicF64::new(gain),
                bandwidth: AtomicF64::new(bandwidth),
                gps_locked: AtomicBool::new(false),
                frames: AtomicU64::new(0),
                overflows: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
            }),
        }
    }

    /// Current center frequency.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.inner.frequency.load()
    }

    /// Current sample rate.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.inner.sample_rate.load()
    }

    /// Current gain.
    #[must_use]
    pub fn gain(&self) -> f64 {
        self.inner.gain.load()
    }

    /// Current bandwidth.
    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        self.inner.bandwidth.load()
    }

    /// GPS lock state.
    #[must_use]
    pub fn gps_locked(&self) -> bool {
        self.inner.gps_locked.load(Ordering::Acquire)
    }

    /// Store a new center frequency.
    pub fn set_frequency(&self, value: f64) {
        self.inner.frequency.store(value);
    }

    /// Store a new sample rate.
    pub fn set_sample_rate(&self, value: f64) {
        self.inner.sample_rate.store(value);
    }

    /// Store a new gain.
    pub fn set_gain(&self, value: f64) {
        self.inner.gain.store(value);
    }

    /// Store a new bandwidth.
    pub fn set_bandwidth(&self, value: f64) {
        self.inner.bandwidth.store(value);
    }

    /// Store the GPS lock state.
    pub fn set_gps_locked(&self, locked: bool) {
        self.inner.gps_locked.store(locked, Ordering::Release);
    }

    /// Read all values at once. Fields are loaded individually, so a concurrent
    /// retune may be observed half-applied for one cycle.
    #[must_use]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            frequency: self.frequency(),
            sample_rate: self.sample_rate(),
            gain: self.gain(),
            bandwidth: self.bandwidth(),
            gps_locked: self.gps_locked(),
        }
    }

    /// Count one produced frame; returns the new total.
    pub fn record_frame(&self) -> u64 {
        self.inner.frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one overflow event.
    pub fn record_overflow(&self) {
        self.inner.overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one fetch timeout.
    pub fn record_timeout(&self) {
        self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames produced so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    /// Overflow events so far.
    #[must_use]
    pub fn overflows(&self) -> u64 {
        self.inner.overflows.load(Ordering::Relaxed)
    }

    /// Fetch timeouts so far.
    #[must_use]
    pub fn timeouts(&self) -> u64 {
        self.inner.timeouts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_values_visible_across_clones() {
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let writer = params.clone();
        thread::spawn(move || {
            writer.set_frequency(2.4e9);
            writer.set_gps_locked(true);
        })
        .join()
        .unwrap();

        let snap = params.snapshot();
        assert_eq!(snap.frequency, 2.4e9);
        assert_eq!(snap.sample_rate, 10e6);
        assert!(snap.gps_locked);
    }

    #[test]
    fn test_counters() {
        let params = SharedParams::new(1.0, 1.0, 0.0, 0.0);
        assert_eq!(params.record_frame(), 1);
        assert_eq!(params.record_frame(), 2);
        params.record_overflow();
        params.record_timeout();
        params.record_timeout();
        assert_eq!(params.frames(), 2);
        assert_eq!(params.overflows(), 1);
        assert_eq!(params.timeouts(), 2);
    }
}
