//! Binary layout of the shared spectrum region.
//!
//! All fields are little-endian at fixed offsets. Nothing here touches raw
//! pointers: header and slot contents are encoded into and decoded from byte
//! slices, and [`shm_ring`](crate::shm_ring) copies those slices in and out of
//! the mapping.
//!
//! ```text
//! Region header (64 bytes)
//!   0  magic          u32   0x53445246 "SDRF"
//!   4  version        u32
//!   8  ring_size      u32
//!  12  fft_size       u32
//!  16  channel_count  u32
//!  20  frame_size     u32   bytes per slot, multiple of 8
//!  24  write_index    u64   atomic, monotonic
//!  32  sample_rate    f64   atomic (bit pattern)
//!  40  gps_locked     u8    atomic
//!  41  streaming      u8    atomic
//!  42  reserved       [u8; 22]
//!
//! Slot i at 64 + i * frame_size
//!   0  frame_number   u64
//!   8  timestamp      f64
//!  16  center_freq    f64
//!  24  sample_rate    f64
//!  32  fft_size       u32
//!  36  channel_mask   u16   bit c set when channel c carries data
//!  38  flags          u16   bit0 gps_locked, bit1 overflow
//!  40  peak_bin       [i16; 2]
//!  44  peak_power     [f32; 2]
//!  52  reserved       u32
//!  56  spectrum       [f32; channel_count * fft_size], channel-major
//! ```

use crate::error::{Result, StorageError};
use bytes::{Buf, BufMut};
use sdr_core::limits::{self, MAX_CHANNELS, RING_MAGIC, RING_VERSION};
use sdr_core::{FrameFlags, SpectrumFrame};

/// Size of the region header.
pub const HEADER_SIZE: usize = 64;
/// Size of the per-slot header preceding the spectrum payload.
pub const SLOT_HEADER_SIZE: usize = 56;

/// Offset of the atomic `write_index`.
pub const WRITE_INDEX_OFFSET: usize = 24;
/// Offset of the atomic `sample_rate` bit pattern.
pub const SAMPLE_RATE_OFFSET: usize = 32;
/// Offset of the atomic `gps_locked` byte.
pub const GPS_LOCKED_OFFSET: usize = 40;
/// Offset of the atomic `streaming` byte.
pub const STREAMING_OFFSET: usize = 41;

const _: () = assert!(WRITE_INDEX_OFFSET % 8 == 0 && SAMPLE_RATE_OFFSET % 8 == 0);
const _: () = assert!(STREAMING_OFFSET < HEADER_SIZE);

/// Static shape of a ring region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    /// Number of slots.
    pub ring_size: usize,
    /// Bins per channel.
    pub fft_size: usize,
    /// Channels per slot.
    pub channel_count: usize,
    /// Bytes per slot.
    pub frame_size: usize,
}

impl RingGeometry {
    /// Compute the geometry, rejecting shapes the layout cannot carry.
    pub fn new(ring_size: usize, fft_size: usize, channel_count: usize) -> Result<Self> {
        if ring_size < limits::MIN_RING_SIZE || ring_size > u32::MAX as usize {
            return Err(StorageError::InvalidGeometry(format!(
                "ring_size {} must be at least {}",
                ring_size,
                limits::MIN_RING_SIZE
            )));
        }
        if !limits::is_valid_fft_size(fft_size) {
            return Err(StorageError::InvalidGeometry(format!(
                "fft_size {} is not a supported FFT size",
                fft_size
            )));
        }
        if channel_count == 0 || channel_count > MAX_CHANNELS {
            return Err(StorageError::InvalidGeometry(format!(
                "channel_count {} outside [1, {}]",
                channel_count, MAX_CHANNELS
            )));
        }
        let payload = SLOT_HEADER_SIZE + channel_count * fft_size * 4;
        Ok(Self {
            ring_size,
            fft_size,
            channel_count,
            frame_size: payload.next_multiple_of(8),
        })
    }

    /// Total bytes of the region.
    #[must_use]
    pub fn region_len(&self) -> usize {
        HEADER_SIZE + self.ring_size * self.frame_size
    }

    /// Byte range of the slot holding index `index`.
    #[must_use]
    pub fn slot_range(&self, index: u64) -> std::ops::Range<usize> {
        let slot = (index % self.ring_size as u64) as usize;
        let start = HEADER_SIZE + slot * self.frame_size;
        start..start + self.frame_size
    }
}

/// Non-atomic header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionHeader {
    /// Magic tag.
    pub magic: u32,
    /// Layout version.
    pub version: u32,
    /// Shape recorded by the producer.
    pub ring_size: u32,
    /// Bins per channel.
    pub fft_size: u32,
    /// Channels per slot.
    pub channel_count: u32,
    /// Bytes per slot.
    pub frame_size: u32,
}

impl RegionHeader {
    /// Header describing `geometry` at the current version.
    #[must_use]
    pub fn for_geometry(geometry: &RingGeometry) -> Self {
        Self {
            magic: RING_MAGIC,
            version: RING_VERSION,
            ring_size: geometry.ring_size as u32,
            fft_size: geometry.fft_size as u32,
            channel_count: geometry.channel_count as u32,
            frame_size: geometry.frame_size as u32,
        }
    }

    /// Write the static fields into the first 24 bytes of `buf`.
    pub fn encode(&self, mut buf: &mut [u8]) {
        buf.put_u32_le(self.magic);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.ring_size);
        buf.put_u32_le(self.fft_size);
        buf.put_u32_le(self.channel_count);
        buf.put_u32_le(self.frame_size);
    }

    /// Read the static fields. `buf` must hold at least [`HEADER_SIZE`] bytes.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(StorageError::RegionTooSmall {
                len: buf.len(),
                required: HEADER_SIZE,
            });
        }
        Ok(Self {
            magic: buf.get_u32_le(),
            version: buf.get_u32_le(),
            ring_size: buf.get_u32_le(),
            fft_size: buf.get_u32_le(),
            channel_count: buf.get_u32_le(),
            frame_size: buf.get_u32_le(),
        })
    }

    /// Check magic and version, then rebuild and cross-check the geometry.
    pub fn validate(&self) -> Result<RingGeometry> {
        if self.magic != RING_MAGIC {
            return Err(StorageError::BadMagic { found: self.magic });
        }
        if self.version != RING_VERSION {
            return Err(StorageError::VersionMismatch {
                found: self.version,
                expected: RING_VERSION,
            });
        }
        let geometry = RingGeometry::new(
            self.ring_size as usize,
            self.fft_size as usize,
            self.channel_count as usize,
        )?;
        if geometry.frame_size != self.frame_size as usize {
            return Err(StorageError::InvalidGeometry(format!(
                "frame_size {} does not match {} computed from the header",
                self.frame_size, geometry.frame_size
            )));
        }
        Ok(geometry)
    }
}

/// Encode `frame` into one slot. Channels beyond `geometry.channel_count` are
/// ignored; missing channels are zero-filled and left out of the channel mask.
pub fn encode_slot(geometry: &RingGeometry, frame: &SpectrumFrame, slot: &mut [u8]) {
    let mut buf = &mut slot[..geometry.frame_size];

    let mut mask = 0u16;
    let mut peak_bin = [0i16; MAX_CHANNELS];
    let mut peak_power = [0f32; MAX_CHANNELS];
    for (c, ch) in frame.channels.iter().take(geometry.channel_count).enumerate() {
        mask |= 1u16 << c;
        peak_bin[c] = ch.peak_bin;
        peak_power[c] = ch.peak_power;
    }

    buf.put_u64_le(frame.frame_number);
    buf.put_f64_le(frame.timestamp);
    buf.put_f64_le(frame.center_freq);
    buf.put_f64_le(frame.sample_rate);
    buf.put_u32_le(geometry.fft_size as u32);
    buf.put_u16_le(mask);
    buf.put_u16_le(frame.flags.bits());
    for bin in peak_bin {
        buf.put_i16_le(bin);
    }
    for power in peak_power {
        buf.put_f32_le(power);
    }
    buf.put_u32_le(0);

    for c in 0..geometry.channel_count {
        match frame.channels.get(c) {
            Some(ch) => {
                let bins = &ch.spectrum[..geometry.fft_size.min(ch.spectrum.len())];
                for &v in bins {
                    buf.put_f32_le(v);
                }
                buf.put_bytes(0, (geometry.fft_size - bins.len()) * 4);
            }
            None => buf.put_bytes(0, geometry.fft_size * 4),
        }
    }
}

/// Decode one slot into `frame`, reusing its spectrum allocations.
pub fn decode_slot(geometry: &RingGeometry, slot: &[u8], frame: &mut SpectrumFrame) {
    let mut buf = &slot[..geometry.frame_size];

    frame.frame_number = buf.get_u64_le();
    frame.timestamp = buf.get_f64_le();
    frame.center_freq = buf.get_f64_le();
    frame.sample_rate = buf.get_f64_le();
    frame.fft_size = buf.get_u32_le();
    let mask = buf.get_u16_le();
    frame.flags = FrameFlags::from_bits(buf.get_u16_le());
    let mut peak_bin = [0i16; MAX_CHANNELS];
    for bin in peak_bin.iter_mut() {
        *bin = buf.get_i16_le();
    }
    let mut peak_power = [0f32; MAX_CHANNELS];
    for power in peak_power.iter_mut() {
        *power = buf.get_f32_le();
    }
    buf.advance(4);

    let present = (0..geometry.channel_count)
        .take_while(|&c| mask & (1u16 << c) != 0)
        .count();
    frame.channels.resize_with(present, Default::default);
    for c in 0..geometry.channel_count {
        match frame.channels.get_mut(c) {
            Some(ch) => {
                ch.peak_bin = peak_bin[c];
                ch.peak_power = peak_power[c];
                ch.spectrum.clear();
                ch.spectrum
                    .extend((0..geometry.fft_size).map(|_| buf.get_f32_le()));
            }
            None => buf.advance(geometry.fft_size * 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_core::ChannelSpectrum;

    fn frame(fft_size: usize, channels: usize) -> SpectrumFrame {
        SpectrumFrame {
            frame_number: 42,
            timestamp: 12.5,
            center_freq: 915e6,
            sample_rate: 10e6,
            fft_size: fft_size as u32,
            flags: FrameFlags {
                gps_locked: true,
                overflow: false,
            },
            channels: (0..channels)
                .map(|c| ChannelSpectrum {
                    spectrum: (0..fft_size).map(|i| i as f32 + c as f32 * 0.5).collect(),
                    peak_bin: (fft_size - 1 - c) as i16,
                    peak_power: -3.0 - c as f32,
                })
                .collect(),
        }
    }

    #[test]
    fn test_geometry_frame_size_is_aligned() {
        let g = RingGeometry::new(64, 2048, 2).unwrap();
        assert_eq!(g.frame_size, 56 + 2 * 2048 * 4);
        assert_eq!(g.frame_size % 8, 0);
        assert_eq!(g.region_len(), 64 + 64 * g.frame_size);
        assert_eq!(g.slot_range(65), g.slot_range(1));
        assert_eq!(g.slot_range(0).start, HEADER_SIZE);
    }

    #[test]
    fn test_geometry_rejects_bad_shapes() {
        assert!(RingGeometry::new(1, 2048, 1).is_err());
        assert!(RingGeometry::new(64, 1000, 1).is_err());
        assert!(RingGeometry::new(64, 2048, 0).is_err());
        assert!(RingGeometry::new(64, 2048, 3).is_err());
    }

    #[test]
    fn test_header_fields_at_documented_offsets() {
        let g = RingGeometry::new(8, 1024, 1).unwrap();
        let mut buf = [0u8; HEADER_SIZE];
        RegionHeader::for_geometry(&g).encode(&mut buf);

        assert_eq!(&buf[0..4], &0x5344_5246u32.to_le_bytes());
        assert_eq!(&buf[4..8], &1u32.to_le_bytes());
        assert_eq!(&buf[8..12], &8u32.to_le_bytes());
        assert_eq!(&buf[12..16], &1024u32.to_le_bytes());
        assert_eq!(&buf[16..20], &1u32.to_le_bytes());
        assert_eq!(&buf[20..24], &(g.frame_size as u32).to_le_bytes());

        let decoded = RegionHeader::decode(&buf).unwrap();
        assert_eq!(decoded.validate().unwrap(), g);
    }

    #[test]
    fn test_header_validation_failures() {
        let g = RingGeometry::new(8, 1024, 1).unwrap();
        let mut header = RegionHeader::for_geometry(&g);

        header.magic = 0xDEAD_BEEF;
        assert!(matches!(
            header.validate(),
            Err(StorageError::BadMagic { found: 0xDEAD_BEEF })
        ));

        header.magic = RING_MAGIC;
        header.version = 2;
        assert!(matches!(
            header.validate(),
            Err(StorageError::VersionMismatch { found: 2, .. })
        ));

        header.version = RING_VERSION;
        header.frame_size += 8;
        assert!(matches!(
            header.validate(),
            Err(StorageError::InvalidGeometry(_))
        ));

        assert!(RegionHeader::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_slot_carries_all_channels() {
        let g = RingGeometry::new(4, 64, 2).unwrap();
        let original = frame(64, 2);
        let mut slot = vec![0xAAu8; g.frame_size];
        encode_slot(&g, &original, &mut slot);

        assert_eq!(&slot[0..8], &42u64.to_le_bytes());
        assert_eq!(&slot[36..38], &0b11u16.to_le_bytes());

        let mut decoded = SpectrumFrame::default();
        decode_slot(&g, &slot, &mut decoded);
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_slot_zero_fills_missing_channel() {
        let g = RingGeometry::new(4, 64, 2).unwrap();
        let mut slot = vec![0xAAu8; g.frame_size];
        encode_slot(&g, &frame(64, 1), &mut slot);

        assert_eq!(&slot[36..38], &0b01u16.to_le_bytes());
        let second = SLOT_HEADER_SIZE + 64 * 4;
        assert!(slot[second..second + 64 * 4].iter().all(|&b| b == 0));

        let mut decoded = SpectrumFrame::with_shape(64, 2);
        decode_slot(&g, &slot, &mut decoded);
        assert_eq!(decoded.channel_count(), 1);
    }
}
