//! Radio front end contract.
//!
//! Everything chipset specific (synthesizers, gain tables, clocking, enumeration)
//! lives behind [`RadioFrontEnd`]. The pipeline only needs fixed-length sample
//! blocks and a small set of named, range-checked parameter writes.

use crate::error::{FrontEndError, FrontEndErrorKind};
use crate::types::SampleBlock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Tunable front end parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioParameter {
    /// Center frequency, Hz.
    Frequency,
    /// Sample rate, samples per second.
    SampleRate,
    /// Receive gain, dB.
    Gain,
    /// Analog bandwidth, Hz.
    Bandwidth,
}

impl RadioParameter {
    /// Unit suffix used in messages.
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            RadioParameter::Frequency | RadioParameter::Bandwidth => "Hz",
            RadioParameter::SampleRate => "S/s",
            RadioParameter::Gain => "dB",
        }
    }
}

impl std::fmt::Display for RadioParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RadioParameter::Frequency => "frequency",
            RadioParameter::SampleRate => "sample_rate",
            RadioParameter::Gain => "gain",
            RadioParameter::Bandwidth => "bandwidth",
        };
        f.write_str(label)
    }
}

/// Inclusive hardware capability range of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRange {
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
}

impl CapabilityRange {
    /// New range. Bounds are reordered if given reversed.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// True when `value` lies within `[min, max]`. NaN is never contained.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Validate `value` for `param`, producing an `OutOfRange` error naming the bounds.
    pub fn check(
        &self,
        device: &str,
        param: RadioParameter,
        value: f64,
    ) -> Result<f64, FrontEndError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(FrontEndError::new(
                device,
                FrontEndErrorKind::OutOfRange,
                // bounds first: the control wire truncates long messages
                format!(
                    "{} range [{}, {}] {}, got {:e}",
                    param,
                    self.min,
                    self.max,
                    param.unit(),
                    value
                ),
            ))
        }
    }
}

/// Environmental readings reported by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReadings {
    /// Board temperature in degrees Celsius, when the hardware has a sensor.
    pub temperature_c: Option<f64>,
    /// Reference clock locked to GPS.
    pub gps_locked: bool,
}

/// Hardware collaborator yielding sample blocks and accepting parameter writes.
///
/// Implementations are driven from two threads (acquisition and control plane)
/// through a [`SharedRadio`] mutex, so every call is serialized.
pub trait RadioFrontEnd: Send {
    /// Device name used in logs and metadata.
    fn name(&self) -> &str;

    /// True once the device can accept configuration.
    fn is_ready(&self) -> bool;

    /// Number of receive channels delivered per block.
    fn channel_count(&self) -> usize;

    /// Capability range of `param`.
    fn capability(&self, param: RadioParameter) -> CapabilityRange;

    /// Apply `value` and return the value the hardware actually settled on.
    ///
    /// Values outside [`capability`](Self::capability) fail with
    /// [`FrontEndErrorKind::OutOfRange`](crate::FrontEndErrorKind::OutOfRange) and leave
    /// the hardware untouched.
    fn set_parameter(&mut self, param: RadioParameter, value: f64)
        -> Result<f64, FrontEndError>;

    /// Begin yielding blocks of `block_len` samples per channel.
    fn start_stream(&mut self, block_len: usize) -> Result<(), FrontEndError>;

    /// Fetch the next block, waiting at most `timeout`.
    fn get_block(&mut self, timeout: Duration) -> Result<SampleBlock, FrontEndError>;

    /// Stop yielding blocks. Idempotent.
    fn stop_stream(&mut self) -> Result<(), FrontEndError>;

    /// Current sensor readings.
    fn sensors(&self) -> SensorReadings;
}

/// Front end handle shared by the acquisition loop and the control plane.
pub type SharedRadio = Arc<Mutex<dyn RadioFrontEnd>>;

/// Wrap a concrete front end into a [`SharedRadio`].
pub fn share<R: RadioFrontEnd + 'static>(radio: R) -> SharedRadio {
    Arc::new(Mutex::new(radio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_inclusive_bounds() {
        let range = CapabilityRange::new(70e6, 6e9);
        assert!(range.contains(70e6));
        assert!(range.contains(6e9));
        assert!(!range.contains(70e6 - 1.0));
        assert!(!range.contains(6e9 + 1.0));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn test_check_reports_bounds() {
        let range = CapabilityRange::new(0.0, 76.0);
        assert_eq!(range.check("mock", RadioParameter::Gain, 76.0), Ok(76.0));
        let err = range
            .check("mock", RadioParameter::Gain, 80.0)
            .unwrap_err();
        assert_eq!(err.kind, FrontEndErrorKind::OutOfRange);
        assert_eq!(err.message, "gain range [0, 76] dB, got 8e1");
    }

    #[test]
    fn test_capability_reorders_bounds() {
        let range = CapabilityRange::new(10.0, 0.0);
        assert_eq!(range.min, 0.0);
        assert_eq!(range.max, 10.0);
    }
}
