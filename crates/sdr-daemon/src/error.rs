//! Daemon level errors.

use sdr_core::{FrontEndError, SdrError};
use sdr_dsp::DspError;
use sdr_server::ControlError;
use sdr_storage::StorageError;
use thiserror::Error;

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Errors that abort daemon setup or the acquisition loop.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] SdrError),

    /// Front end failure during configuration or streaming.
    #[error(transparent)]
    FrontEnd(#[from] FrontEndError),

    /// Spectrum engine setup failed.
    #[error(transparent)]
    Dsp(#[from] DspError),

    /// Shared memory or recording failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Control plane failure.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Front end never reported ready.
    #[error("Front end '{0}' did not become ready")]
    NotReady(String),

    /// State machine was asked for a transition it does not allow.
    #[error("Invalid acquisition transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// State the loop was in.
        from: crate::acquisition::AcquisitionState,
        /// State that was requested.
        to: crate::acquisition::AcquisitionState,
    },

    /// Output stream failure.
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// Record serialization failure.
    #[error("Record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
