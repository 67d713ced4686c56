//! `sdr-server`
//!
//! Local control plane of the spectrum daemon. Clients connect to a Unix
//! socket and exchange fixed-size binary messages (see [`protocol`]) to retune
//! the radio, query status or request shutdown while acquisition keeps running.

pub mod client;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;

pub use client::ControlClient;
pub use error::{ControlError, Result};
pub use handler::ControlHandler;
pub use protocol::{ControlCommand, ControlRequest, ControlResponse};
pub use server::{ControlServer, ControlServerHandle};
