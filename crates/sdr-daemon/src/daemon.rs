//! Daemon orchestration: builds every component from configuration and runs
//! either the streaming pipeline or a sweep.

use crate::acquisition::{apply_radio_settings, wait_ready, Acquisition, AcquisitionSummary};
use crate::encoder::FrameFormat;
use crate::error::Result;
use crate::recorder::Recorder;
use crate::scanner::{ScanSummary, Scanner};
use crate::sink::{FrameSink, RingSink, StreamSink};
use sdr_core::limits::MAX_CHANNELS;
use sdr_core::{CancellationToken, OutputMode, RunMode, SdrConfig, SharedParams, SharedRadio};
use sdr_server::{ControlHandler, ControlServer};
use std::io::Write;

/// Outcome of a daemon run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunSummary {
    /// Streaming pipeline counters.
    Stream(AcquisitionSummary),
    /// Sweep results.
    Scan(ScanSummary),
}

/// Configured daemon, ready to run on the calling thread.
pub struct Daemon {
    config: SdrConfig,
    radio: SharedRadio,
    cancel: CancellationToken,
    output: Option<Box<dyn Write + Send>>,
}

impl Daemon {
    /// New daemon driving `radio`. `cancel` stops it from any thread.
    pub fn new(config: SdrConfig, radio: SharedRadio, cancel: CancellationToken) -> Self {
        Self {
            config,
            radio,
            cancel,
            output: None,
        }
    }

    /// Write text, binary and scan records to `output` instead of stdout.
    #[must_use]
    pub fn with_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.output = Some(output);
        self
    }

    /// Validate the configuration and run until finished or cancelled.
    pub fn run(self) -> Result<RunSummary> {
        self.config.validate()?;
        match self.config.mode {
            RunMode::Stream => self.run_stream().map(RunSummary::Stream),
            RunMode::Scan => self.run_scan().map(RunSummary::Scan),
        }
    }

    fn stream_sink(output: Option<Box<dyn Write + Send>>, format: FrameFormat) -> Box<dyn FrameSink> {
        match output {
            Some(writer) => Box::new(StreamSink::new(format, writer)),
            None => Box::new(StreamSink::stdout(format)),
        }
    }

    fn run_stream(self) -> Result<AcquisitionSummary> {
        let Self {
            config,
            radio,
            cancel,
            output,
        } = self;
        let params = initial_params(&config);
        let (device, channels) = {
            let guard = radio.lock();
            (guard.name().to_string(), guard.channel_count().clamp(1, MAX_CHANNELS))
        };

        let sink: Box<dyn FrameSink> = match config.output.mode {
            OutputMode::Text => Self::stream_sink(output, FrameFormat::Text),
            OutputMode::Binary => Self::stream_sink(output, FrameFormat::Binary),
            OutputMode::Shm => Box::new(RingSink::open(
                &config.output.shm_path(),
                config.output.ring_size,
                config.spectrum.fft_size,
                channels,
            )?),
        };

        let mut acquisition = Acquisition::new(radio.clone(), params.clone(), sink, cancel.clone())
            .with_radio_settings(config.radio.clone())
            .with_spectrum(config.spectrum.clone())
            .with_settings(config.acquisition.clone());

        if let Some(path) = &config.recording.path {
            acquisition = acquisition.with_recorder(Recorder::open(path, &config.recording, device)?);
        }

        if config.control.enabled {
            let handler = ControlHandler::new(radio, params, cancel.clone());
            let control = ControlServer::new(&config.control.socket_path, handler)
                .with_poll_interval(config.control.poll_interval)
                .spawn(&cancel)?;
            acquisition = acquisition.with_control(control);
        }

        acquisition.run()
    }

    fn run_scan(mut self) -> Result<ScanSummary> {
        let params = initial_params(&self.config);
        if !wait_ready(&self.radio, self.config.acquisition.fetch_timeout, &self.cancel)? {
            return Ok(ScanSummary::default());
        }
        apply_radio_settings(&mut *self.radio.lock(), &self.config.radio, &params)?;

        let output: Box<dyn Write + Send> = match self.output.take() {
            Some(writer) => writer,
            None => Box::new(std::io::stdout()),
        };
        Scanner::new(
            self.radio.clone(),
            params,
            self.config.scanner.clone(),
            self.config.spectrum.clone(),
            self.cancel.clone(),
            output,
        )
        .with_fetch_timeout(self.config.acquisition.fetch_timeout)
        .run()
    }
}

fn initial_params(config: &SdrConfig) -> SharedParams {
    SharedParams::new(
        config.radio.frequency,
        config.radio.sample_rate,
        config.radio.gain,
        config.radio.bandwidth.unwrap_or(0.0),
    )
}
