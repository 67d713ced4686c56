//! Mock radio front end for running the SDR pipeline without hardware.
//!
//! [`MockRadio`] implements [`sdr_core::RadioFrontEnd`] with a seeded
//! tone-plus-noise source, optional real-time pacing and a [`FaultScript`] for
//! timeouts, overflows, short blocks and fatal failures.

mod faults;
mod mock_radio;

pub use faults::{Fault, FaultScript};
pub use mock_radio::{
    MockRadio, BANDWIDTH_RANGE, FREQUENCY_RANGE, GAIN_RANGE, SAMPLE_RATE_RANGE,
};
