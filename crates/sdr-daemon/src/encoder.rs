//! Stream encodings of spectrum frames.
//!
//! Both stream encodings carry only the primary channel. Shared memory output
//! carries every channel and is encoded by the ring itself.
//!
//! Binary header, little endian, 48 bytes, followed by `fft_size` f32 bins:
//!
//! ```text
//! 0   magic "SDRB"      4   flags u16        6   peak_bin i16
//! 8   frame_number u64  16  timestamp f64    24  center_freq f64
//! 32  sample_rate f64   40  fft_size u32     44  peak_power f32
//! ```

use crate::error::Result;
use bytes::{Buf, BufMut, BytesMut};
use sdr_core::{ChannelSpectrum, FrameFlags, SpectrumFrame};
use serde::{Serialize, Serializer};

/// Binary record magic.
pub const BINARY_MAGIC: [u8; 4] = *b"SDRB";

/// Binary header length.
pub const BINARY_HEADER_LEN: usize = 48;

/// Stream encoding selected for stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// One JSON object per line.
    Text,
    /// Fixed header plus raw spectrum floats.
    Binary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextRecord<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    frame_number: u64,
    timestamp: f64,
    center_frequency: f64,
    sample_rate: f64,
    fft_size: u32,
    gps_locked: bool,
    overflow: bool,
    peak_bin: i16,
    peak_power: f32,
    data: Bins<'a>,
}

/// Spectrum bins written as the exact f64 value of each f32, so a text
/// consumer parses the same numbers a binary consumer reads.
struct Bins<'a>(&'a [f32]);

impl Serialize for Bins<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|&v| f64::from(v)))
    }
}

fn primary(frame: &SpectrumFrame) -> (i16, f32, &[f32]) {
    match frame.primary() {
        Some(ChannelSpectrum {
            spectrum,
            peak_bin,
            peak_power,
        }) => (*peak_bin, *peak_power, spectrum.as_slice()),
        None => (0, 0.0, &[][..]),
    }
}

impl FrameFormat {
    /// Append the encoding of `frame` to `out`.
    pub fn encode(self, frame: &SpectrumFrame, out: &mut BytesMut) -> Result<()> {
        match self {
            FrameFormat::Text => encode_text(frame, out),
            FrameFormat::Binary => {
                encode_binary(frame, out);
                Ok(())
            }
        }
    }
}

/// Append one JSON line of type `fft`.
pub fn encode_text(frame: &SpectrumFrame, out: &mut BytesMut) -> Result<()> {
    let (peak_bin, peak_power, data) = primary(frame);
    let record = TextRecord {
        kind: "fft",
        frame_number: frame.frame_number,
        timestamp: frame.timestamp,
        center_frequency: frame.center_freq,
        sample_rate: frame.sample_rate,
        fft_size: frame.fft_size,
        gps_locked: frame.flags.gps_locked,
        overflow: frame.flags.overflow,
        peak_bin,
        peak_power,
        data: Bins(data),
    };
    let mut writer = out.writer();
    serde_json::to_writer(&mut writer, &record)?;
    writer.into_inner().put_u8(b'\n');
    Ok(())
}

/// Append one binary record.
pub fn encode_binary(frame: &SpectrumFrame, out: &mut BytesMut) {
    let (peak_bin, peak_power, data) = primary(frame);
    out.reserve(BINARY_HEADER_LEN + data.len() * 4);
    out.put_slice(&BINARY_MAGIC);
    out.put_u16_le(frame.flags.bits());
    out.put_i16_le(peak_bin);
    out.put_u64_le(frame.frame_number);
    out.put_f64_le(frame.timestamp);
    out.put_f64_le(frame.center_freq);
    out.put_f64_le(frame.sample_rate);
    out.put_u32_le(data.len() as u32);
    out.put_f32_le(peak_power);
    for &bin in data {
        out.put_f32_le(bin);
    }
}

/// Decoded binary record header.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryHeader {
    /// Lock and overflow flags.
    pub flags: FrameFlags,
    /// Peak bin of the primary channel.
    pub peak_bin: i16,
    /// Frame counter.
    pub frame_number: u64,
    /// Block timestamp, seconds.
    pub timestamp: f64,
    /// Center frequency, Hz.
    pub center_freq: f64,
    /// Sample rate, S/s.
    pub sample_rate: f64,
    /// Number of f32 bins that follow.
    pub fft_size: u32,
    /// Peak power, dB.
    pub peak_power: f32,
}

impl BinaryHeader {
    /// Parse a header; `None` when the slice is short or the magic is wrong.
    #[must_use]
    pub fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < BINARY_HEADER_LEN || buf[..4] != BINARY_MAGIC {
            return None;
        }
        buf.advance(4);
        Some(Self {
            flags: FrameFlags::from_bits(buf.get_u16_le()),
            peak_bin: buf.get_i16_le(),
            frame_number: buf.get_u64_le(),
            timestamp: buf.get_f64_le(),
            center_freq: buf.get_f64_le(),
            sample_rate: buf.get_f64_le(),
            fft_size: buf.get_u32_le(),
            peak_power: buf.get_f32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> SpectrumFrame {
        let mut frame = SpectrumFrame::with_shape(1024, 2);
        frame.frame_number = 17;
        frame.timestamp = 1.25;
        frame.center_freq = 915e6;
        frame.sample_rate = 10e6;
        frame.flags = FrameFlags {
            gps_locked: true,
            overflow: false,
        };
        for (i, bin) in frame.channels[0].spectrum.iter_mut().enumerate() {
            *bin = -80.0 - (i as f32) * 0.013_7;
        }
        frame.channels[0].peak_bin = 614;
        frame.channels[0].peak_power = -12.5;
        frame
    }

    #[test]
    fn test_text_record_fields() {
        let mut out = BytesMut::new();
        encode_text(&frame(), &mut out).unwrap();
        assert_eq!(out.last(), Some(&b'\n'));

        let value: serde_json::Value = serde_json::from_slice(&out[..out.len() - 1]).unwrap();
        assert_eq!(value["type"], "fft");
        assert_eq!(value["frameNumber"], 17);
        assert_eq!(value["centerFrequency"], 915e6);
        assert_eq!(value["sampleRate"], 10e6);
        assert_eq!(value["fftSize"], 1024);
        assert_eq!(value["gpsLocked"], true);
        assert_eq!(value["peakBin"], 614);
        assert_eq!(value["data"].as_array().unwrap().len(), 1024);
    }

    #[test]
    fn test_text_and_binary_carry_the_same_bins() {
        let frame = frame();
        let mut out = BytesMut::new();
        encode_text(&frame, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out[..out.len() - 1]).unwrap();
        let data = value["data"].as_array().unwrap();
        for (text, &bin) in data.iter().zip(&frame.channels[0].spectrum) {
            assert_eq!(text.as_f64().unwrap() as f32, bin);
        }
    }

    #[test]
    fn test_binary_header_layout() {
        let mut out = BytesMut::new();
        encode_binary(&frame(), &mut out);
        assert_eq!(out.len(), BINARY_HEADER_LEN + 1024 * 4);
        assert_eq!(&out[..4], b"SDRB");

        let header = BinaryHeader::decode(&out).unwrap();
        assert_eq!(header.frame_number, 17);
        assert_eq!(header.fft_size, 1024);
        assert_eq!(header.peak_bin, 614);
        assert_eq!(header.peak_power, -12.5);
        assert!(header.flags.gps_locked);

        let first = f32::from_le_bytes([out[48], out[49], out[50], out[51]]);
        assert_eq!(first, -80.0);
    }

    #[test]
    fn test_binary_is_much_smaller_than_text() {
        let frame = frame();
        let mut text = BytesMut::new();
        let mut binary = BytesMut::new();
        FrameFormat::Text.encode(&frame, &mut text).unwrap();
        FrameFormat::Binary.encode(&frame, &mut binary).unwrap();
        let saving = 1.0 - binary.len() as f64 / text.len() as f64;
        assert!(saving >= 0.65, "{} vs {} bytes", binary.len(), text.len());
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        assert!(BinaryHeader::decode(&[0u8; 48]).is_none());
        assert!(BinaryHeader::decode(b"SDRB").is_none());
    }
}
