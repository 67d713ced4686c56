//! Engine errors.

use thiserror::Error;

/// Result alias for DSP operations.
pub type Result<T> = std::result::Result<T, DspError>;

/// Errors raised by the spectrum engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    /// FFT size is not a power of two within the accepted bounds.
    #[error("Invalid FFT size {0}")]
    InvalidFftSize(usize),

    /// Block length differs from the planned FFT size.
    #[error("Block length {actual} does not match FFT size {expected}")]
    LengthMismatch {
        /// Planned FFT size.
        expected: usize,
        /// Samples supplied.
        actual: usize,
    },
}
