//! Command dispatch for the control plane.
//!
//! Parameter writes are range checked against the front end capability before
//! the hardware is touched. Only values the hardware reports back are stored in
//! [`SharedParams`], so the acquisition loop never observes a rejected value.

use crate::protocol::{ControlCommand, ControlRequest, ControlResponse};
use sdr_core::{CancellationToken, RadioParameter, SharedParams, SharedRadio};

/// Applies control requests to the shared radio and parameter block.
#[derive(Clone)]
pub struct ControlHandler {
    radio: SharedRadio,
    params: SharedParams,
    cancel: CancellationToken,
}

impl ControlHandler {
    /// New handler. `cancel` is the daemon-wide shutdown token triggered by `Stop`.
    pub fn new(radio: SharedRadio, params: SharedParams, cancel: CancellationToken) -> Self {
        Self {
            radio,
            params,
            cancel,
        }
    }

    /// Run one request to completion.
    pub fn handle(&self, request: ControlRequest) -> ControlResponse {
        match request.command.parameter() {
            Some(param) => self.set(param, request.value),
            None => match request.command {
                ControlCommand::GetStatus => self.status(),
                ControlCommand::Ping => ControlResponse::ok(0.0, "pong"),
                ControlCommand::Stop => {
                    tracing::info!("Stop requested over control socket");
                    self.cancel.cancel();
                    ControlResponse::ok(0.0, "stopping")
                }
                _ => ControlResponse::rejected(0.0, "unsupported command"),
            },
        }
    }

    fn current(&self, param: RadioParameter) -> f64 {
        match param {
            RadioParameter::Frequency => self.params.frequency(),
            RadioParameter::SampleRate => self.params.sample_rate(),
            RadioParameter::Gain => self.params.gain(),
            RadioParameter::Bandwidth => self.params.bandwidth(),
        }
    }

    fn store(&self, param: RadioParameter, value: f64) {
        match param {
            RadioParameter::Frequency => self.params.set_frequency(value),
            RadioParameter::SampleRate => self.params.set_sample_rate(value),
            RadioParameter::Gain => self.params.set_gain(value),
            RadioParameter::Bandwidth => self.params.set_bandwidth(value),
        }
    }

    fn set(&self, param: RadioParameter, value: f64) -> ControlResponse {
        let mut radio = self.radio.lock();
        let device = radio.name().to_string();

        if !radio.is_ready() {
            return ControlResponse::rejected(self.current(param), "front end not ready");
        }

        let range = radio.capability(param);
        if let Err(e) = range.check(&device, param, value) {
            tracing::warn!(device = %device, %param, value, "Rejected out-of-range value");
            return ControlResponse::rejected(self.current(param), e.message);
        }

        match radio.set_parameter(param, value) {
            Ok(actual) => {
                drop(radio);
                self.store(param, actual);
                tracing::info!(device = %device, %param, requested = value, actual, "Parameter applied");
                ControlResponse::ok(actual, format!("{} set", param))
            }
            Err(e) => {
                tracing::warn!(device = %device, %param, value, error = %e, "Parameter write failed");
                ControlResponse::rejected(self.current(param), e.message)
            }
        }
    }

    fn status(&self) -> ControlResponse {
        let snap = self.params.snapshot();
        ControlResponse::ok(
            snap.frequency,
            format!(
                "freq={:.0} rate={:.0} gain={:.1} bw={:.0}",
                snap.frequency, snap.sample_rate, snap.gain, snap.bandwidth
            ),
        )
    }
}
