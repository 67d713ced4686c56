//! `sdr-dsp`
//!
//! Spectrum computation for the SDR pipeline:
//!
//! - [`SpectrumEngine`]: windowed forward FFT into a shifted, gain-corrected dB spectrum
//! - [`Window`]: rectangular, Hann and 4-term Blackman-Harris coefficients
//! - [`detect_signals`] / [`SpectrumAverager`]: threshold detection used by the sweep scanner

pub mod detect;
pub mod engine;
pub mod error;
pub mod window;

pub use detect::{detect_signals, Detection, SpectrumAverager};
pub use engine::SpectrumEngine;
pub use error::{DspError, Result};
pub use window::Window;
