//! Acquisition loop state machine.
//!
//! ```text
//! Idle ──ready──► Configuring ──tuned, engine built──► Streaming
//!   │                  │                                  │ stop / STOP command / fatal error
//!   └──────────────────┴──────────────► Draining ◄────────┘
//!                                          │ writer stopped, ring closed, control joined
//!                                          ▼
//!                                       Stopped
//! ```
//!
//! The loop runs on one thread. Its only blocking call is the bounded block
//! fetch; cancellation is checked once per cycle.

use crate::error::{DaemonError, Result};
use crate::recorder::Recorder;
use crate::sink::FrameSink;
use crate::status::{StatusReport, StatusTicker};
use sdr_core::limits::MAX_CHANNELS;
use sdr_core::{
    AcquisitionSettings, CancellationToken, FrameFlags, FrontEndErrorKind, RadioFrontEnd,
    RadioParameter, RadioSettings, SampleBlock, SharedParams, SharedRadio, SpectrumFrame,
    SpectrumSettings,
};
use sdr_dsp::SpectrumEngine;
use sdr_server::ControlServerHandle;
use sdr_storage::WriterStats;
use std::time::{Duration, Instant};

const READY_POLL: Duration = Duration::from_millis(10);

/// Lifecycle states of the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionState {
    /// Waiting for the front end.
    Idle,
    /// Applying initial tuning and building the engine.
    Configuring,
    /// Producing frames.
    Streaming,
    /// Shutting components down.
    Draining,
    /// Terminal.
    Stopped,
}

impl AcquisitionState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: AcquisitionState) -> bool {
        use AcquisitionState::{Configuring, Draining, Idle, Stopped, Streaming};
        matches!(
            (self, next),
            (Idle, Configuring)
                | (Configuring, Streaming)
                | (Idle | Configuring | Streaming, Draining)
                | (Draining, Stopped)
        )
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionSummary {
    /// Frames delivered to the sink.
    pub frames: u64,
    /// Front end overflow events.
    pub overflows: u64,
    /// Fetch timeouts.
    pub timeouts: u64,
    /// Blocks discarded for a wrong length.
    pub short_blocks: u64,
    /// Final writer counters when recording.
    pub recording: Option<WriterStats>,
}

/// Apply the configured tuning to `radio`, storing the values the hardware
/// settled on in `params`.
pub(crate) fn apply_radio_settings(
    radio: &mut dyn RadioFrontEnd,
    settings: &RadioSettings,
    params: &SharedParams,
) -> Result<()> {
    let frequency = radio.set_parameter(RadioParameter::Frequency, settings.frequency)?;
    params.set_frequency(frequency);
    let rate = radio.set_parameter(RadioParameter::SampleRate, settings.sample_rate)?;
    params.set_sample_rate(rate);
    let gain = radio.set_parameter(RadioParameter::Gain, settings.gain)?;
    params.set_gain(gain);
    if let Some(bandwidth) = settings.bandwidth {
        let bandwidth = radio.set_parameter(RadioParameter::Bandwidth, bandwidth)?;
        params.set_bandwidth(bandwidth);
    }
    tracing::info!(
        device = radio.name(),
        frequency,
        sample_rate = rate,
        gain,
        "Front end configured"
    );
    Ok(())
}

/// Wait until `radio` reports ready, at most `timeout`. Returns `Ok(false)` if
/// cancelled first.
pub(crate) fn wait_ready(
    radio: &SharedRadio,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let guard = radio.lock();
        if guard.is_ready() {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Err(DaemonError::NotReady(guard.name().to_string()));
        }
        drop(guard);
        std::thread::sleep(READY_POLL);
    }
}

/// The acquisition loop and the components it drains on shutdown.
pub struct Acquisition {
    radio: SharedRadio,
    params: SharedParams,
    cancel: CancellationToken,
    radio_settings: RadioSettings,
    spectrum: SpectrumSettings,
    settings: AcquisitionSettings,
    sink: Option<Box<dyn FrameSink>>,
    recorder: Option<Recorder>,
    control: Option<ControlServerHandle>,
    state: AcquisitionState,
    short_blocks: u64,
}

impl Acquisition {
    /// New loop in `Idle`.
    pub fn new(
        radio: SharedRadio,
        params: SharedParams,
        sink: Box<dyn FrameSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            radio,
            params,
            cancel,
            radio_settings: RadioSettings::default(),
            spectrum: SpectrumSettings::default(),
            settings: AcquisitionSettings::default(),
            sink: Some(sink),
            recorder: None,
            control: None,
            state: AcquisitionState::Idle,
            short_blocks: 0,
        }
    }

    /// Initial tuning.
    #[must_use]
    pub fn with_radio_settings(mut self, settings: RadioSettings) -> Self {
        self.radio_settings = settings;
        self
    }

    /// FFT size and window.
    #[must_use]
    pub fn with_spectrum(mut self, settings: SpectrumSettings) -> Self {
        self.spectrum = settings;
        self
    }

    /// Fetch timeout, status interval and frame limit.
    #[must_use]
    pub fn with_settings(mut self, settings: AcquisitionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Forward raw primary-channel samples to a recording.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Control server joined during `Draining`.
    #[must_use]
    pub fn with_control(mut self, control: ControlServerHandle) -> Self {
        self.control = Some(control);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    fn transition(&mut self, next: AcquisitionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DaemonError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::info!(from = ?self.state, to = ?next, "Acquisition state");
        self.state = next;
        Ok(())
    }

    /// Run to `Stopped`.
    ///
    /// Every component is drained even when acquisition fails; the first error
    /// encountered is returned after draining completes.
    pub fn run(mut self) -> Result<AcquisitionSummary> {
        let acquired = self.acquire();
        if let Err(e) = &acquired {
            tracing::error!(error = %e, state = ?self.state, "Acquisition failed");
        }

        self.transition(AcquisitionState::Draining)?;
        let (recording, drained) = self.drain();
        self.transition(AcquisitionState::Stopped)?;

        acquired?;
        drained?;

        let summary = AcquisitionSummary {
            frames: self.params.frames(),
            overflows: self.params.overflows(),
            timeouts: self.params.timeouts(),
            short_blocks: self.short_blocks,
            recording,
        };
        tracing::info!(
            frames = summary.frames,
            overflows = summary.overflows,
            timeouts = summary.timeouts,
            short_blocks = summary.short_blocks,
            "Acquisition stopped"
        );
        Ok(summary)
    }

    fn acquire(&mut self) -> Result<()> {
        if !wait_ready(&self.radio, self.settings.fetch_timeout, &self.cancel)? {
            return Ok(());
        }
        self.transition(AcquisitionState::Configuring)?;

        let (mut engine, channels) = {
            let mut radio = self.radio.lock();
            apply_radio_settings(&mut *radio, &self.radio_settings, &self.params)?;
            let engine = SpectrumEngine::new(self.spectrum.fft_size, self.spectrum.window)?;
            radio.start_stream(engine.fft_size())?;
            self.params.set_gps_locked(radio.sensors().gps_locked);
            (engine, radio.channel_count().clamp(1, MAX_CHANNELS))
        };

        self.transition(AcquisitionState::Streaming)?;
        if let Some(recorder) = &mut self.recorder {
            recorder.begin(self.params.frequency(), self.params.sample_rate());
        }
        self.stream(&mut engine, channels)
    }

    fn stream(&mut self, engine: &mut SpectrumEngine, channels: usize) -> Result<()> {
        let fft_size = engine.fft_size();
        let mut frame = SpectrumFrame::with_shape(fft_size, channels);
        let mut ticker = StatusTicker::new(self.settings.status_interval);
        let mut frame_number = 0u64;
        let mut overflowed = false;

        while !self.cancel.is_cancelled() {
            if self.settings.max_frames.is_some_and(|max| frame_number >= max) {
                tracing::info!(frames = frame_number, "Frame limit reached");
                break;
            }

            let fetched = self.radio.lock().get_block(self.settings.fetch_timeout);
            match fetched {
                Ok(block) if !is_complete(&block, fft_size) => {
                    self.short_blocks += 1;
                    tracing::warn!(
                        expected = fft_size,
                        actual = block.len(),
                        channels = block.channel_count(),
                        "Discarding short block"
                    );
                }
                Ok(block) => {
                    if let Some(recorder) = &self.recorder {
                        recorder.write(block.primary());
                    }
                    engine.compute(&block, &mut frame)?;

                    let snap = self.params.snapshot();
                    frame.frame_number = frame_number;
                    frame.center_freq = snap.frequency;
                    frame.sample_rate = snap.sample_rate;
                    frame.flags = FrameFlags {
                        gps_locked: snap.gps_locked,
                        overflow: std::mem::take(&mut overflowed),
                    };

                    if let Some(sink) = &mut self.sink {
                        sink.publish(&frame)?;
                    }
                    frame_number += 1;
                    self.params.record_frame();
                }
                Err(e) if e.kind == FrontEndErrorKind::Timeout => {
                    self.params.record_timeout();
                    tracing::warn!(device = %e.device, "Block fetch timed out, retrying");
                }
                Err(e) if e.kind == FrontEndErrorKind::Overflow => {
                    self.params.record_overflow();
                    overflowed = true;
                    tracing::warn!(device = %e.device, overflows = self.params.overflows(), "Front end overflow");
                }
                Err(e) => return Err(e.into()),
            }

            if ticker.due(Instant::now()) {
                self.emit_status()?;
            }
        }
        Ok(())
    }

    fn emit_status(&mut self) -> Result<()> {
        let sensors = self.radio.lock().sensors();
        self.params.set_gps_locked(sensors.gps_locked);
        let report = StatusReport::collect(
            &self.params,
            sensors,
            self.recorder.as_ref().map(Recorder::stats),
        );
        report.log();
        match &mut self.sink {
            Some(sink) => sink.status(&report),
            None => Ok(()),
        }
    }

    fn drain(&mut self) -> (Option<WriterStats>, Result<()>) {
        let mut first_error: Option<DaemonError> = None;
        let mut keep = |result: Result<()>| {
            if let Err(e) = result {
                tracing::error!(error = %e, "Shutdown step failed");
                first_error.get_or_insert(e);
            }
        };

        keep(self.radio.lock().stop_stream().map_err(DaemonError::from));

        let recording = match self.recorder.take().map(Recorder::finish) {
            Some(Ok(stats)) => Some(stats),
            Some(Err(e)) => {
                keep(Err(e));
                None
            }
            None => None,
        };

        if let Some(sink) = self.sink.take() {
            keep(sink.finish());
        }
        if let Some(control) = self.control.take() {
            keep(control.shutdown().map_err(DaemonError::from));
        }

        (recording, first_error.map_or(Ok(()), Err))
    }
}

/// Every computed channel carries exactly `fft_size` samples.
fn is_complete(block: &SampleBlock, fft_size: usize) -> bool {
    !block.channels.is_empty()
        && block
            .channels
            .iter()
            .take(MAX_CHANNELS)
            .all(|samples| samples.len() == fft_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_core::radio::share;
    use sdr_driver_mock::{Fault, FaultScript, MockRadio};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn settings(max_frames: u64) -> AcquisitionSettings {
        AcquisitionSettings {
            max_frames: Some(max_frames),
            ..AcquisitionSettings::default()
        }
    }

    fn spectrum(fft_size: usize) -> SpectrumSettings {
        SpectrumSettings {
            fft_size,
            ..SpectrumSettings::default()
        }
    }

    fn text_sink(buf: &SharedBuf) -> Box<dyn FrameSink> {
        Box::new(crate::sink::StreamSink::new(
            crate::encoder::FrameFormat::Text,
            buf.clone(),
        ))
    }

    #[test]
    fn test_transition_table() {
        use AcquisitionState::*;
        assert!(Idle.can_transition_to(Configuring));
        assert!(Streaming.can_transition_to(Draining));
        assert!(Idle.can_transition_to(Draining));
        assert!(!Idle.can_transition_to(Streaming));
        assert!(!Stopped.can_transition_to(Idle));
        assert!(!Draining.can_transition_to(Streaming));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_short_block_discarded_with_warning() {
        let buf = SharedBuf::default();
        let radio = MockRadio::new(1).with_faults(FaultScript::none().at(1, Fault::ShortBlock(100)));
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let summary = Acquisition::new(share(radio), params, text_sink(&buf), CancellationToken::new())
            .with_spectrum(spectrum(256))
            .with_settings(settings(5))
            .run()
            .unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.short_blocks, 1);
        assert!(logs_contain("Discarding short block"));
        assert_eq!(buf.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count(), 5);
    }

    #[test]
    fn test_uneven_channel_block_discarded() {
        let buf = SharedBuf::default();
        let radio = MockRadio::new(1).with_channels(2).with_faults(
            FaultScript::none()
                .at(1, Fault::UnevenChannels(300))
                .at(3, Fault::UnevenChannels(100)),
        );
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let summary = Acquisition::new(share(radio), params, text_sink(&buf), CancellationToken::new())
            .with_spectrum(spectrum(256))
            .with_settings(settings(4))
            .run()
            .unwrap();

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.short_blocks, 2);
        assert_eq!(buf.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count(), 4);
    }

    #[test]
    fn test_transient_errors_are_retried_and_flagged() {
        let buf = SharedBuf::default();
        let radio = MockRadio::new(1).with_faults(
            FaultScript::none()
                .at(0, Fault::Timeout)
                .at(2, Fault::Overflow),
        );
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let summary = Acquisition::new(share(radio), params, text_sink(&buf), CancellationToken::new())
            .with_spectrum(spectrum(256))
            .with_settings(settings(3))
            .run()
            .unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.overflows, 1);

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let flags: Vec<bool> = text
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["overflow"] == true)
            .collect();
        // block 1 -> frame 0, overflow on block 2 flags frame 1
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_fatal_error_drains_and_reports() {
        let buf = SharedBuf::default();
        let radio = MockRadio::new(1).with_faults(FaultScript::none().fatal_after(4));
        let shared = share(radio);
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let err = Acquisition::new(shared.clone(), params.clone(), text_sink(&buf), CancellationToken::new())
            .with_spectrum(spectrum(256))
            .with_settings(AcquisitionSettings::default())
            .run()
            .unwrap_err();

        assert!(matches!(err, DaemonError::FrontEnd(ref e) if e.is_fatal()));
        assert_eq!(params.frames(), 4);
    }

    #[test]
    fn test_cancelled_before_ready_never_configures() {
        let buf = SharedBuf::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let summary = Acquisition::new(
            share(MockRadio::new(1).not_ready()),
            params,
            text_sink(&buf),
            cancel,
        )
        .run()
        .unwrap();
        assert_eq!(summary.frames, 0);
        assert!(buf.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_never_ready_front_end_fails() {
        let buf = SharedBuf::default();
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let err = Acquisition::new(
            share(MockRadio::new(1).not_ready()),
            params,
            text_sink(&buf),
            CancellationToken::new(),
        )
        .with_settings(AcquisitionSettings {
            fetch_timeout: Duration::from_millis(30),
            ..AcquisitionSettings::default()
        })
        .run()
        .unwrap_err();
        assert!(matches!(err, DaemonError::NotReady(_)));
    }

    #[test]
    fn test_frame_metadata_follows_shared_params() {
        let buf = SharedBuf::default();
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let radio = share(MockRadio::new(1));
        let acquisition = Acquisition::new(radio, params.clone(), text_sink(&buf), CancellationToken::new())
            .with_radio_settings(RadioSettings {
                frequency: 433.92e6,
                ..RadioSettings::default()
            })
            .with_spectrum(spectrum(256))
            .with_settings(settings(2));
        acquisition.run().unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        for line in text.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["centerFrequency"], 433.92e6);
        }
        assert_eq!(params.frequency(), 433.92e6);
    }

    #[test]
    fn test_recording_written_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.cf32");
        let recorder = Recorder::open(
            &path,
            &sdr_core::RecordingSettings {
                path: Some(path.clone()),
                block_samples: 256,
                pool_blocks: 64,
            },
            "mock",
        )
        .unwrap();

        let buf = SharedBuf::default();
        let params = SharedParams::new(915e6, 10e6, 50.0, 0.0);
        let summary = Acquisition::new(share(MockRadio::new(1)), params, text_sink(&buf), CancellationToken::new())
            .with_spectrum(spectrum(256))
            .with_settings(settings(10))
            .with_recorder(recorder)
            .run()
            .unwrap();

        let stats = summary.recording.unwrap();
        assert_eq!(stats.samples_written + stats.dropped_blocks * 256, 10 * 256);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            stats.samples_written * 8
        );
        let meta = sdr_storage::RecordingMetadata::read_sidecar(
            &sdr_storage::RecordingMetadata::sidecar_path(&path),
        )
        .unwrap();
        assert_eq!(meta.sample_rate, 10e6);
        assert_eq!(meta.hardware, "mock");
    }
}
