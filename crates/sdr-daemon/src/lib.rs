//! `sdr-daemon`
//!
//! Runs the spectrum pipeline end to end:
//!
//! - [`acquisition`]: the `Idle → Configuring → Streaming → Draining → Stopped` loop
//! - [`encoder`] / [`sink`]: text, binary and shared-memory frame output
//! - [`recorder`]: raw IQ capture with a metadata sidecar
//! - [`scanner`]: frequency sweep with threshold detection
//! - [`daemon`]: builds all of the above from an [`SdrConfig`](sdr_core::SdrConfig)

pub mod acquisition;
pub mod daemon;
pub mod encoder;
pub mod error;
pub mod recorder;
pub mod scanner;
pub mod sink;
pub mod status;

pub use acquisition::{Acquisition, AcquisitionState, AcquisitionSummary};
pub use daemon::{Daemon, RunSummary};
pub use encoder::{BinaryHeader, FrameFormat};
pub use error::{DaemonError, Result};
pub use recorder::Recorder;
pub use scanner::{ScanSummary, Scanner};
pub use sink::{FrameSink, RingSink, StreamSink};
pub use status::{StatusReport, StatusTicker};
