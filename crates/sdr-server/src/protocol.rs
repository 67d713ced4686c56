//! Fixed-size binary control protocol.
//!
//! ```text
//! Request  (9 bytes):  type u8 | value f64 LE
//! Response (73 bytes): success u8 | actual f64 LE | message [u8; 64] UTF-8, NUL padded
//! ```
//!
//! One request produces exactly one response. A connection may carry any
//! number of sequential round trips.

use crate::error::{ControlError, Result};
use bytes::{Buf, BufMut};
use sdr_core::limits::CONTROL_MESSAGE_LEN;
use sdr_core::RadioParameter;

/// Encoded request length.
pub const REQUEST_LEN: usize = 9;
/// Encoded response length.
pub const RESPONSE_LEN: usize = 1 + 8 + CONTROL_MESSAGE_LEN;

/// Control command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCommand {
    /// Retune the center frequency (Hz).
    SetFrequency = 0x01,
    /// Change the sample rate (S/s).
    SetSampleRate = 0x02,
    /// Change the receive gain (dB).
    SetGain = 0x03,
    /// Change the analog bandwidth (Hz).
    SetBandwidth = 0x04,
    /// Echo the current parameters.
    GetStatus = 0x10,
    /// Liveness check.
    Ping = 0x20,
    /// Request global shutdown.
    Stop = 0xFF,
}

impl ControlCommand {
    /// Wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The front end parameter a set-command writes, if any.
    #[must_use]
    pub fn parameter(self) -> Option<RadioParameter> {
        match self {
            ControlCommand::SetFrequency => Some(RadioParameter::Frequency),
            ControlCommand::SetSampleRate => Some(RadioParameter::SampleRate),
            ControlCommand::SetGain => Some(RadioParameter::Gain),
            ControlCommand::SetBandwidth => Some(RadioParameter::Bandwidth),
            ControlCommand::GetStatus | ControlCommand::Ping | ControlCommand::Stop => None,
        }
    }
}

impl TryFrom<u8> for ControlCommand {
    type Error = ControlError;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0x01 => ControlCommand::SetFrequency,
            0x02 => ControlCommand::SetSampleRate,
            0x03 => ControlCommand::SetGain,
            0x04 => ControlCommand::SetBandwidth,
            0x10 => ControlCommand::GetStatus,
            0x20 => ControlCommand::Ping,
            0xFF => ControlCommand::Stop,
            other => return Err(ControlError::UnknownCommand(other)),
        })
    }
}

/// One control request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRequest {
    /// Command to run.
    pub command: ControlCommand,
    /// Argument; ignored by commands without one.
    pub value: f64,
}

impl ControlRequest {
    /// New request.
    #[must_use]
    pub fn new(command: ControlCommand, value: f64) -> Self {
        Self { command, value }
    }

    /// Wire encoding.
    #[must_use]
    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut out = [0u8; REQUEST_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(self.command.code());
        buf.put_f64_le(self.value);
        out
    }

    /// Decode a request; unknown command codes are rejected.
    pub fn decode(bytes: &[u8; REQUEST_LEN]) -> Result<Self> {
        let mut buf = &bytes[..];
        let command = ControlCommand::try_from(buf.get_u8())?;
        Ok(Self {
            command,
            value: buf.get_f64_le(),
        })
    }
}

/// One control response.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    /// Whether the command was applied.
    pub success: bool,
    /// Value in effect after the command.
    pub actual: f64,
    /// Human readable detail, at most 64 bytes on the wire.
    pub message: String,
}

impl ControlResponse {
    /// Successful response.
    pub fn ok(actual: f64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            actual,
            message: message.into(),
        }
    }

    /// Rejected command.
    pub fn rejected(actual: f64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            actual,
            message: message.into(),
        }
    }

    /// Wire encoding. The message is cut at a character boundary to fit.
    #[must_use]
    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut out = [0u8; RESPONSE_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(u8::from(self.success));
        buf.put_f64_le(self.actual);

        let mut end = self.message.len().min(CONTROL_MESSAGE_LEN);
        while !self.message.is_char_boundary(end) {
            end -= 1;
        }
        buf.put_slice(&self.message.as_bytes()[..end]);
        out
    }

    /// Decode a response; the message stops at the first NUL.
    #[must_use]
    pub fn decode(bytes: &[u8; RESPONSE_LEN]) -> Self {
        let mut buf = &bytes[..];
        let success = buf.get_u8() != 0;
        let actual = buf.get_f64_le();
        let text = &buf[..CONTROL_MESSAGE_LEN];
        let len = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        Self {
            success,
            actual,
            message: String::from_utf8_lossy(&text[..len]).into_owned(),
        }
    }
}
