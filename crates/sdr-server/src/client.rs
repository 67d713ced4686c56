//! Blocking control client.

use crate::error::Result;
use crate::protocol::{ControlCommand, ControlRequest, ControlResponse, RESPONSE_LEN};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

/// Connection to a running control server.
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    /// Connect to `path`. Reads and writes time out after `timeout`.
    pub fn connect(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self { stream })
    }

    /// One request/response round trip.
    pub fn request(&mut self, command: ControlCommand, value: f64) -> Result<ControlResponse> {
        self.stream
            .write_all(&ControlRequest::new(command, value).encode())?;
        let mut response = [0u8; RESPONSE_LEN];
        self.stream.read_exact(&mut response)?;
        Ok(ControlResponse::decode(&response))
    }

    /// Retune the center frequency.
    pub fn set_frequency(&mut self, hz: f64) -> Result<ControlResponse> {
        self.request(ControlCommand::SetFrequency, hz)
    }

    /// Change the sample rate.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<ControlResponse> {
        self.request(ControlCommand::SetSampleRate, rate)
    }

    /// Change the gain.
    pub fn set_gain(&mut self, db: f64) -> Result<ControlResponse> {
        self.request(ControlCommand::SetGain, db)
    }

    /// Change the analog bandwidth.
    pub fn set_bandwidth(&mut self, hz: f64) -> Result<ControlResponse> {
        self.request(ControlCommand::SetBandwidth, hz)
    }

    /// Query the current parameters.
    pub fn status(&mut self) -> Result<ControlResponse> {
        self.request(ControlCommand::GetStatus, 0.0)
    }

    /// Liveness check.
    pub fn ping(&mut self) -> Result<ControlResponse> {
        self.request(ControlCommand::Ping, 0.0)
    }

    /// Ask the daemon to shut down.
    pub fn stop(&mut self) -> Result<ControlResponse> {
        self.request(ControlCommand::Stop, 0.0)
    }
}
