//! Error types for shared-memory and recording operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by the ring distributor, the block writer and the sidecar writer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Region file could not be created, sized or opened.
    #[error("Failed to create shared region '{}': {source}", .path.display())]
    Create {
        /// Region file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Existing region could not be opened for reading.
    #[error("Failed to open shared region '{}': {source}", .path.display())]
    Open {
        /// Region file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Region file could not be mapped.
    #[error("Failed to map shared region '{}': {source}", .path.display())]
    Map {
        /// Region file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An existing region carries a layout this producer cannot reuse.
    #[error("Shared region '{}' exists with an incompatible layout: {reason}", .path.display())]
    IncompatibleRegion {
        /// Region file path.
        path: PathBuf,
        /// Which header field disagreed.
        reason: String,
    },

    /// Region does not start with the expected magic tag.
    #[error("Bad region magic 0x{found:08X}")]
    BadMagic {
        /// Tag read from the region.
        found: u32,
    },

    /// Region was written by a different layout version.
    #[error("Region layout version {found} is not supported (expected {expected})")]
    VersionMismatch {
        /// Version read from the region.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// Region is shorter than its header claims.
    #[error("Region holds {len} bytes but {required} are required")]
    RegionTooSmall {
        /// Mapped length in bytes.
        len: usize,
        /// Length the header requires.
        required: usize,
    },

    /// Requested or recorded geometry is unusable.
    #[error("Invalid ring geometry: {0}")]
    InvalidGeometry(String),

    /// Recording file could not be opened.
    #[error("Failed to open recording '{}': {source}", .path.display())]
    OpenRecording {
        /// Recording file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Block writer configuration is unusable.
    #[error("Invalid block writer configuration: {0}")]
    InvalidWriterConfig(String),

    /// Writer thread could not be spawned.
    #[error("Failed to spawn writer thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Metadata sidecar serialization failed.
    #[error("Metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
