//! Control plane errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for control plane operations.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors raised by the control server and client.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Socket could not be bound.
    #[error("Failed to bind control socket '{}': {source}", .path.display())]
    Bind {
        /// Socket path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another process is already serving the socket path.
    #[error("Control socket '{}' is already in use", .path.display())]
    AddrInUse {
        /// Socket path.
        path: PathBuf,
    },

    /// Request carried an unknown command code.
    #[error("Unknown control command 0x{0:02X}")]
    UnknownCommand(u8),

    /// Server thread or runtime could not be started.
    #[error("Failed to start control plane: {0}")]
    Startup(#[source] std::io::Error),

    /// Server thread panicked.
    #[error("Control plane thread panicked")]
    Panicked,

    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
