//! `sdr-storage`
//!
//! Everything that moves pipeline data out of the acquisition thread:
//!
//! - [`shm_ring`]: wait-free single-writer/multi-reader spectrum ring in shared
//!   memory, with its byte layout in [`layout`]
//! - [`block_writer`]: pooled asynchronous writer for raw IQ samples
//! - [`recording`]: JSON metadata sidecar for finished recordings

pub mod block_writer;
pub mod error;
pub mod layout;
pub mod recording;
pub mod shm_ring;

pub use block_writer::{BlockWriter, BlockWriterBuilder, WriterStats};
pub use error::{Result, StorageError};
pub use layout::RingGeometry;
pub use recording::RecordingMetadata;
pub use shm_ring::{ConsumerStats, ReadStatus, RingConsumer, RingProducer, RingRead};
