//! Output sinks for computed frames.

use crate::encoder::FrameFormat;
use crate::error::Result;
use crate::status::StatusReport;
use bytes::{BufMut, BytesMut};
use sdr_core::SpectrumFrame;
use sdr_storage::RingProducer;
use std::io::Write;
use std::path::Path;

/// Destination of every frame produced by the acquisition loop.
pub trait FrameSink: Send {
    /// Deliver one frame.
    fn publish(&mut self, frame: &SpectrumFrame) -> Result<()>;

    /// Deliver a status record. Sinks without a record channel ignore it.
    fn status(&mut self, _report: &StatusReport) -> Result<()> {
        Ok(())
    }

    /// Flush and release the sink.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Text or binary records on a byte stream (normally stdout).
pub struct StreamSink<W> {
    format: FrameFormat,
    writer: W,
    buf: BytesMut,
}

impl<W: Write + Send> StreamSink<W> {
    /// Sink writing `format` records to `writer`.
    pub fn new(format: FrameFormat, writer: W) -> Self {
        Self {
            format,
            writer,
            buf: BytesMut::with_capacity(64 * 1024),
        }
    }
}

impl StreamSink<std::io::Stdout> {
    /// Sink writing to standard output.
    #[must_use]
    pub fn stdout(format: FrameFormat) -> Self {
        Self::new(format, std::io::stdout())
    }
}

impl<W: Write + Send> FrameSink for StreamSink<W> {
    fn publish(&mut self, frame: &SpectrumFrame) -> Result<()> {
        self.buf.clear();
        self.format.encode(frame, &mut self.buf)?;
        self.writer.write_all(&self.buf)?;
        self.writer.flush()?;
        Ok(())
    }

    fn status(&mut self, report: &StatusReport) -> Result<()> {
        // binary consumers parse fixed records only
        if self.format != FrameFormat::Text {
            return Ok(());
        }
        self.buf.clear();
        serde_json::to_writer((&mut self.buf).writer(), report)?;
        self.buf.put_u8(b'\n');
        self.writer.write_all(&self.buf)?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Shared-memory ring output.
pub struct RingSink {
    producer: RingProducer,
}

impl RingSink {
    /// Create or attach the region at `path`.
    pub fn open(path: &Path, ring_size: usize, fft_size: usize, channels: usize) -> Result<Self> {
        let producer = RingProducer::open(path, ring_size, fft_size, channels)?;
        tracing::info!(
            path = %path.display(),
            ring_size,
            fft_size,
            channels,
            "Shared memory output ready"
        );
        Ok(Self { producer })
    }
}

impl FrameSink for RingSink {
    fn publish(&mut self, frame: &SpectrumFrame) -> Result<()> {
        self.producer.publish(frame);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let published = self.producer.published();
        self.producer.close()?;
        tracing::info!(published, "Shared memory output closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_core::{SensorReadings, SharedParams};
    use sdr_storage::RingConsumer;

    #[test]
    fn test_text_sink_writes_frames_and_status() {
        let mut sink = StreamSink::new(FrameFormat::Text, Vec::new());
        let mut frame = SpectrumFrame::with_shape(64, 1);
        frame.frame_number = 3;
        sink.publish(&frame).unwrap();

        let params = SharedParams::new(1e9, 1e6, 0.0, 0.0);
        sink.status(&StatusReport::collect(&params, SensorReadings::default(), None))
            .unwrap();

        let text = String::from_utf8(sink.writer.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"type":"fft","frameNumber":3"#));
        assert!(lines[1].starts_with(r#"{"type":"status""#));
    }

    #[test]
    fn test_binary_sink_skips_status() {
        let mut sink = StreamSink::new(FrameFormat::Binary, Vec::new());
        let params = SharedParams::new(1e9, 1e6, 0.0, 0.0);
        sink.status(&StatusReport::collect(&params, SensorReadings::default(), None))
            .unwrap();
        assert!(sink.writer.is_empty());
    }

    #[test]
    fn test_ring_sink_publishes_and_unlinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let mut sink = RingSink::open(&path, 4, 64, 1).unwrap();
        let mut consumer = RingConsumer::open(&path).unwrap();

        let mut frame = SpectrumFrame::with_shape(64, 1);
        frame.frame_number = 9;
        sink.publish(&frame).unwrap();
        assert_eq!(consumer.try_read().unwrap().frame.frame_number, 9);

        Box::new(sink).finish().unwrap();
        assert!(!path.exists());
    }
}
