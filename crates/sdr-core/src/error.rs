//! Error types shared across the pipeline.
//!
//! Two families live here:
//!
//! - **`SdrError`**: configuration and validation failures raised while the daemon is
//!   being assembled. These are fatal to setup and never reach the hot path.
//! - **`FrontEndError`**: failures reported by a [`RadioFrontEnd`](crate::RadioFrontEnd).
//!   The [`FrontEndErrorKind`] decides how the acquisition loop reacts: transient kinds
//!   are retried and counted, `OutOfRange` is a synchronous rejection, `Fatal` drains
//!   the pipeline.
//!
//! An error is non-fatal iff the hot path can keep producing frames despite it.

use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, SdrError>;

/// Setup and configuration errors.
#[derive(Error, Debug)]
pub enum SdrError {
    /// Configuration could not be extracted from its sources (file, environment).
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds a semantically invalid value.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Front end reported an error during setup.
    #[error(transparent)]
    FrontEnd(#[from] FrontEndError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for SdrError {
    fn from(err: figment::Error) -> Self {
        SdrError::Config(Box::new(err))
    }
}

/// Classification of front end failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEndErrorKind {
    /// Block fetch did not complete within its timeout.
    Timeout,
    /// Hardware reported dropped samples.
    Overflow,
    /// Requested parameter value lies outside the capability range.
    OutOfRange,
    /// Device is not ready to stream or accept configuration.
    NotReady,
    /// Unrecoverable failure.
    Fatal,
}

impl std::fmt::Display for FrontEndErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FrontEndErrorKind::Timeout => "timeout",
            FrontEndErrorKind::Overflow => "overflow",
            FrontEndErrorKind::OutOfRange => "out_of_range",
            FrontEndErrorKind::NotReady => "not_ready",
            FrontEndErrorKind::Fatal => "fatal",
        };
        write!(f, "{}", label)
    }
}

/// Error returned by a radio front end.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Front end '{device}' {kind} error: {message}")]
pub struct FrontEndError {
    /// Name of the device that produced the error.
    pub device: String,
    /// Failure classification.
    pub kind: FrontEndErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl FrontEndError {
    /// Create a new front end error.
    pub fn new(
        device: impl Into<String>,
        kind: FrontEndErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a timed-out fetch.
    pub fn timeout(device: impl Into<String>) -> Self {
        Self::new(device, FrontEndErrorKind::Timeout, "block fetch timed out")
    }

    /// Shorthand for a hardware overflow report.
    pub fn overflow(device: impl Into<String>) -> Self {
        Self::new(device, FrontEndErrorKind::Overflow, "hardware dropped samples")
    }

    /// Retryable errors: the cycle is retried and the event counted.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FrontEndErrorKind::Timeout | FrontEndErrorKind::Overflow
        )
    }

    /// Errors that force the acquisition loop into `Draining`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind == FrontEndErrorKind::Fatal
    }
}
