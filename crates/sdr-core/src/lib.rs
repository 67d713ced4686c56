//! `sdr-core`
//!
//! Core types and contracts shared by every stage of the spectrum pipeline.
//!
//! The pipeline tunes a radio, turns its sample stream into spectral frames and
//! delivers those frames to downstream consumers:
//!
//! ```text
//! RadioFrontEnd ──SampleBlock──► SpectrumEngine ──SpectrumFrame──► stdout | shared memory
//!       │
//!       └──────────────raw samples──────────────► BlockWriter ──► recording file
//!
//! ControlServer ──set_parameter──► RadioFrontEnd
//!       └──────────────atomics─────► SharedParams ──read each cycle──► acquisition loop
//! ```
//!
//! ## Key Types
//!
//! - [`SampleBlock`]: one fixed-length block of complex samples per channel
//! - [`SpectrumFrame`]: computed power spectrum plus metadata
//! - [`RadioFrontEnd`]: the hardware collaborator contract
//! - [`SharedParams`]: single-writer / multi-reader tuning state
//! - [`SdrConfig`]: layered daemon configuration

pub mod config;
pub mod error;
pub mod limits;
pub mod params;
pub mod radio;
pub mod types;

pub use config::{
    AcquisitionSettings, ControlSettings, OutputMode, OutputSettings, RadioSettings,
    RecordingSettings, RunMode, ScannerSettings, SdrConfig, SpectrumSettings,
};
pub use error::{FrontEndError, FrontEndErrorKind, Result, SdrError};
pub use params::{ParamSnapshot, SharedParams};
pub use radio::{CapabilityRange, RadioFrontEnd, RadioParameter, SensorReadings, SharedRadio};
pub use types::{ChannelSpectrum, FrameFlags, SampleBlock, SpectrumFrame, WindowKind};

/// Complex baseband sample type carried through the pipeline.
pub type Complex32 = num_complex::Complex<f32>;

/// Cooperative shutdown token shared by the acquisition, writer and control threads.
pub use tokio_util::sync::CancellationToken;
