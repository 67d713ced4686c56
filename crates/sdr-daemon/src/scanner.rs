//! Frequency sweep with threshold detection.
//!
//! Each step retunes, discards blocks for the settle time, averages spectra
//! over the dwell time and reports every run above the threshold. Settle and
//! dwell are measured in device samples so results do not depend on wall-clock
//! pacing.
//!
//! Records, one JSON object per line:
//!
//! ```text
//! {"type":"detection","frequency":<MHz>,"power":<dB>,"bandwidth":<kHz>,"timestamp":"<RFC 3339>"}
//! {"type":"progress","frequency":<MHz>,"progress":<percent>,"detections":<total>}
//! {"type":"complete","detections":<total>}
//! ```

use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use sdr_core::{
    CancellationToken, FrontEndErrorKind, RadioParameter, ScannerSettings, SharedParams,
    SharedRadio, SpectrumFrame, SpectrumSettings,
};
use sdr_dsp::{detect_signals, Detection, SpectrumAverager, SpectrumEngine};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// Progress records are emitted every this many steps and at the last step.
const PROGRESS_EVERY: usize = 10;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ScanRecord {
    Detection {
        frequency: f64,
        power: f32,
        bandwidth: f64,
        timestamp: String,
    },
    Progress {
        frequency: f64,
        progress: f64,
        detections: usize,
    },
    Complete {
        detections: usize,
    },
}

/// Result of a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    /// Steps completed.
    pub steps: usize,
    /// Steps skipped because the front end rejected the frequency.
    pub skipped: usize,
    /// Every detection reported.
    pub detections: Vec<Detection>,
    /// False when cancelled before the last step.
    pub completed: bool,
}

/// Sweep runner writing records to `out`.
pub struct Scanner<W> {
    radio: SharedRadio,
    params: SharedParams,
    settings: ScannerSettings,
    spectrum: SpectrumSettings,
    fetch_timeout: Duration,
    cancel: CancellationToken,
    out: W,
}

impl<W: Write> Scanner<W> {
    /// New scanner. The radio must already be configured for rate and gain.
    pub fn new(
        radio: SharedRadio,
        params: SharedParams,
        settings: ScannerSettings,
        spectrum: SpectrumSettings,
        cancel: CancellationToken,
        out: W,
    ) -> Self {
        Self {
            radio,
            params,
            settings,
            spectrum,
            fetch_timeout: sdr_core::limits::DEFAULT_FETCH_TIMEOUT,
            cancel,
            out,
        }
    }

    /// Override the per-block fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Number of steps from start to stop inclusive.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        let span = self.settings.stop - self.settings.start;
        if span <= 0.0 || self.settings.step <= 0.0 {
            return 1;
        }
        (span / self.settings.step + 1e-9).floor() as usize + 1
    }

    /// Run the sweep. The stream is stopped on every exit path.
    pub fn run(mut self) -> Result<ScanSummary> {
        let mut engine = SpectrumEngine::new(self.spectrum.fft_size, self.spectrum.window)?;
        self.radio.lock().start_stream(engine.fft_size())?;
        let result = self.sweep(&mut engine);
        if let Err(e) = self.radio.lock().stop_stream() {
            tracing::warn!(error = %e, "Failed to stop stream after sweep");
        }
        result
    }

    fn sweep(&mut self, engine: &mut SpectrumEngine) -> Result<ScanSummary> {
        let total = self.total_steps();
        let mut summary = ScanSummary::default();
        tracing::info!(
            start = self.settings.start,
            stop = self.settings.stop,
            step = self.settings.step,
            steps = total,
            "Sweep started"
        );

        for index in 0..total {
            if self.cancel.is_cancelled() {
                tracing::info!(steps = summary.steps, "Sweep cancelled");
                return Ok(summary);
            }
            let target = self.settings.start + index as f64 * self.settings.step;

            match self.dwell_at(engine, target)? {
                Some(found) => {
                    for detection in found {
                        self.emit(&ScanRecord::Detection {
                            frequency: detection.frequency / 1e6,
                            power: detection.peak_power,
                            bandwidth: detection.bandwidth / 1e3,
                            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                        })?;
                        summary.detections.push(detection);
                    }
                }
                None if self.cancel.is_cancelled() => {
                    tracing::info!(steps = summary.steps, "Sweep cancelled");
                    return Ok(summary);
                }
                None => summary.skipped += 1,
            }
            summary.steps += 1;

            if summary.steps % PROGRESS_EVERY == 0 || summary.steps == total {
                let span = self.settings.stop - self.settings.start;
                let progress = if span > 0.0 {
                    100.0 * (target - self.settings.start) / span
                } else {
                    100.0
                };
                self.emit(&ScanRecord::Progress {
                    frequency: target / 1e6,
                    progress,
                    detections: summary.detections.len(),
                })?;
            }
        }

        self.emit(&ScanRecord::Complete {
            detections: summary.detections.len(),
        })?;
        summary.completed = true;
        tracing::info!(detections = summary.detections.len(), "Sweep complete");
        Ok(summary)
    }

    /// Tune to `target`, settle, average and detect. `None` when the target was
    /// rejected or the sweep was cancelled mid-step.
    fn dwell_at(&mut self, engine: &mut SpectrumEngine, target: f64) -> Result<Option<Vec<Detection>>> {
        let tuned = self
            .radio
            .lock()
            .set_parameter(RadioParameter::Frequency, target);
        let frequency = match tuned {
            Ok(actual) => actual,
            Err(e) if e.kind == FrontEndErrorKind::OutOfRange => {
                tracing::warn!(frequency = target, error = %e, "Skipping untunable step");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.params.set_frequency(frequency);

        let rate = self.params.sample_rate();
        let fft_size = engine.fft_size();
        let mut frame = SpectrumFrame::with_shape(fft_size, 1);
        let mut averager = SpectrumAverager::new(fft_size);

        let settle = samples_for(self.settings.settle, rate);
        let dwell = samples_for(self.settings.dwell, rate).max(1);
        let mut consumed = 0usize;

        while consumed < settle + dwell {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            let fetched = self.radio.lock().get_block(self.fetch_timeout);
            let block = match fetched {
                Ok(block) => block,
                Err(e) if e.is_transient() => {
                    if e.kind == FrontEndErrorKind::Overflow {
                        self.params.record_overflow();
                    } else {
                        self.params.record_timeout();
                    }
                    tracing::debug!(error = %e, "Transient fetch error during sweep");
                    consumed += fft_size;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            consumed += block.len();
            if consumed <= settle || block.len() != fft_size {
                continue;
            }
            engine.compute(&block, &mut frame)?;
            averager.add(&frame.channels[0].spectrum);
        }

        let Some(mean) = averager.mean() else {
            return Ok(Some(Vec::new()));
        };
        Ok(Some(detect_signals(
            &mean,
            frequency,
            rate,
            self.settings.threshold_db,
        )))
    }

    fn emit(&mut self, record: &ScanRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

fn samples_for(duration: Duration, rate: f64) -> usize {
    (duration.as_secs_f64() * rate).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_core::radio::share;
    use sdr_driver_mock::MockRadio;

    fn settings(start: f64, stop: f64, step: f64) -> ScannerSettings {
        ScannerSettings {
            start,
            stop,
            step,
            dwell: Duration::from_millis(1),
            settle: Duration::from_micros(100),
            threshold_db: -40.0,
        }
    }

    fn scanner(radio: MockRadio, settings: ScannerSettings) -> Scanner<Vec<u8>> {
        Scanner::new(
            share(radio),
            SharedParams::new(settings.start, 10e6, 50.0, 0.0),
            settings,
            SpectrumSettings {
                fft_size: 1024,
                ..SpectrumSettings::default()
            },
            CancellationToken::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_total_steps_inclusive() {
        let s = scanner(MockRadio::new(1), settings(88e6, 108e6, 1e6));
        assert_eq!(s.total_steps(), 21);
        let s = scanner(MockRadio::new(1), settings(100e6, 100e6, 1e6));
        assert_eq!(s.total_steps(), 1);
    }

    #[test]
    fn test_sweep_detects_tone_and_emits_records() {
        let radio = MockRadio::new(3).with_tone(1e6, 0.5).with_noise(0.001);
        let mut s = scanner(radio, settings(100e6, 104e6, 2e6));
        let total = s.total_steps();
        let summary = s.sweep_for_test().unwrap();

        assert!(summary.completed);
        assert_eq!(summary.steps, total);
        // the tone sits 1 MHz above every tuned center
        for (i, d) in summary.detections.iter().enumerate() {
            let expected = 100e6 + (i as f64) * 2e6 + 1e6;
            assert!((d.frequency - expected).abs() < 20e3, "{} vs {}", d.frequency, expected);
        }
        assert_eq!(summary.detections.len(), 3);

        let out = String::from_utf8(s.out.clone()).unwrap();
        let records: Vec<serde_json::Value> =
            out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(records.iter().filter(|r| r["type"] == "detection").count(), 3);
        let progress: Vec<_> = records.iter().filter(|r| r["type"] == "progress").collect();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0]["progress"], 100.0);
        assert_eq!(records.last().unwrap()["type"], "complete");
        assert_eq!(records.last().unwrap()["detections"], 3);
    }

    #[test]
    fn test_untunable_steps_are_skipped() {
        // mock tunes from 70 MHz
        let mut s = scanner(MockRadio::new(1), settings(50e6, 80e6, 10e6));
        let summary = s.sweep_for_test().unwrap();
        assert_eq!(summary.steps, 4);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_cancelled_sweep_is_incomplete() {
        let mut s = scanner(MockRadio::new(1), settings(88e6, 108e6, 1e6));
        s.cancel.cancel();
        let summary = s.sweep_for_test().unwrap();
        assert!(!summary.completed);
        assert_eq!(summary.steps, 0);
        assert!(s.out.is_empty());
    }

    impl Scanner<Vec<u8>> {
        fn sweep_for_test(&mut self) -> Result<ScanSummary> {
            let mut engine = SpectrumEngine::new(self.spectrum.fft_size, self.spectrum.window)?;
            self.radio.lock().start_stream(engine.fft_size())?;
            self.sweep(&mut engine)
        }
    }
}
