#![allow(unsafe_code)]
//! Wait-free shared-memory frame ring.
//!
//! One [`RingProducer`] fans spectrum frames out to any number of
//! [`RingConsumer`]s in other processes through a file-backed mapping (by default
//! under `/dev/shm`). The producer never waits on a reader: a slow reader simply
//! falls behind and skips ahead, and a reader racing the producer detects torn
//! slots by re-validating `write_index` after copying.
//!
//! # Protocol
//!
//! Producer, per frame:
//!
//! 1. `w = write_index` (relaxed, single writer)
//! 2. encode the frame into slot `w mod ring_size`
//! 3. release fence, then store `w + 1` with release ordering
//!
//! Consumer, per read:
//!
//! 1. acquire-load `w`; `cursor == w` means no data
//! 2. if `w - cursor >= ring_size` the reader has overrun: jump to `w - 1` and
//!    report the skipped frames
//! 3. copy slot `cursor mod ring_size`, acquire fence, reload `write_index`
//! 4. if the producer reached `cursor + ring_size` meanwhile, the copy may be torn:
//!    discard and retry
//!
//! At exactly `w - cursor == ring_size` the oldest frame sits in the slot the
//! producer writes next and cannot be validated, so it is skipped like any
//! other overrun.
//!
//! All raw pointer access to the mapping lives in this module; the byte layout
//! itself is in [`layout`](crate::layout).

use crate::error::{Result, StorageError};
use crate::layout::{
    self, RegionHeader, RingGeometry, GPS_LOCKED_OFFSET, HEADER_SIZE, SAMPLE_RATE_OFFSET,
    STREAMING_OFFSET, WRITE_INDEX_OFFSET,
};
use memmap2::{Mmap, MmapMut, MmapOptions};
use sdr_core::SpectrumFrame;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, AtomicU64, AtomicU8, Ordering};

/// Attempts per `try_read` before giving up on a slot the producer keeps overwriting.
const MAX_READ_ATTEMPTS: usize = 8;

/// Header atomics at their fixed offsets.
///
/// # Safety
///
/// `base` must point to a live mapping of at least [`HEADER_SIZE`] bytes that
/// stays mapped for `'a`. Mappings are page aligned, so every offset used here
/// is naturally aligned for its atomic type.
struct HeaderAtomics<'a> {
    write_index: &'a AtomicU64,
    sample_rate: &'a AtomicU64,
    gps_locked: &'a AtomicU8,
    streaming: &'a AtomicU8,
}

impl<'a> HeaderAtomics<'a> {
    unsafe fn at(base: *const u8) -> Self {
        // SAFETY: guaranteed by the caller (see type docs)
        unsafe {
            Self {
                write_index: &*(base.add(WRITE_INDEX_OFFSET) as *const AtomicU64),
                sample_rate: &*(base.add(SAMPLE_RATE_OFFSET) as *const AtomicU64),
                gps_locked: &*(base.add(GPS_LOCKED_OFFSET) as *const AtomicU8),
                streaming: &*(base.add(STREAMING_OFFSET) as *const AtomicU8),
            }
        }
    }
}

fn read_existing_header(file: &mut File) -> std::io::Result<Option<[u8; HEADER_SIZE]>> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(None);
    }
    let mut buf = [0u8; HEADER_SIZE];
    if len < HEADER_SIZE as u64 {
        // too short to be ours; leave zeroed so validation reports bad magic
        return Ok(Some(buf));
    }
    file.read_exact(&mut buf)?;
    Ok(Some(buf))
}

// =============================================================================
// Producer
// =============================================================================

/// Single writer of a shared frame ring.
pub struct RingProducer {
    path: PathBuf,
    /// Keeps the mapping alive; accessed through `base`.
    mmap: MmapMut,
    /// SAFETY: start of `mmap`, valid for `geometry.region_len()` bytes while `mmap` lives
    base: *mut u8,
    geometry: RingGeometry,
    published: u64,
    closed: bool,
}

// SAFETY: the producer exclusively owns its mapping; the raw pointer is never
// shared, and cross-process readers only observe it through atomics.
unsafe impl Send for RingProducer {}

impl std::fmt::Debug for RingProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingProducer")
            .field("path", &self.path)
            .field("geometry", &self.geometry)
            .field("write_index", &self.write_index())
            .field("published", &self.published)
            .finish()
    }
}

impl RingProducer {
    /// Create (or reinitialize) the region at `path` and mark it streaming.
    ///
    /// An existing region is reused only when its header matches the requested
    /// geometry; its `write_index` is preserved so attached readers continue.
    /// Any other existing content is rejected with
    /// [`StorageError::IncompatibleRegion`].
    pub fn open(
        path: &Path,
        ring_size: usize,
        fft_size: usize,
        channel_count: usize,
    ) -> Result<Self> {
        let geometry = RingGeometry::new(ring_size, fft_size, channel_count)?;
        let region_len = geometry.region_len();
        let create_err = |source| StorageError::Create {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(create_err)?;

        let reused = match read_existing_header(&mut file).map_err(create_err)? {
            None => false,
            Some(bytes) => {
                let incompatible = |reason: String| StorageError::IncompatibleRegion {
                    path: path.to_path_buf(),
                    reason,
                };
                let existing = RegionHeader::decode(&bytes)?
                    .validate()
                    .map_err(|e| incompatible(e.to_string()))?;
                if existing != geometry {
                    return Err(incompatible(format!(
                        "region holds {:?}, requested {:?}",
                        existing, geometry
                    )));
                }
                let len = file.metadata().map_err(create_err)?.len();
                if len != region_len as u64 {
                    return Err(incompatible(format!(
                        "region is {} bytes, expected {}",
                        len, region_len
                    )));
                }
                true
            }
        };

        if !reused {
            file.set_len(region_len as u64).map_err(create_err)?;
        }

        // SAFETY: the file was sized to `region_len` above (or verified to be that
        // size); truncation by another process is outside this protocol.
        let mut mmap = unsafe {
            MmapOptions::new()
                .len(region_len)
                .map_mut(&file)
                .map_err(|source| StorageError::Map {
                    path: path.to_path_buf(),
                    source,
                })?
        };

        RegionHeader::for_geometry(&geometry).encode(&mut mmap[..HEADER_SIZE]);
        let base = mmap.as_mut_ptr();

        let producer = Self {
            path: path.to_path_buf(),
            mmap,
            base,
            geometry,
            published: 0,
            closed: false,
        };
        let atomics = producer.atomics();
        if !reused {
            atomics.write_index.store(0, Ordering::Relaxed);
        }
        atomics.sample_rate.store(0f64.to_bits(), Ordering::Relaxed);
        atomics.gps_locked.store(0, Ordering::Relaxed);
        atomics.streaming.store(1, Ordering::Release);

        tracing::info!(
            path = %producer.path.display(),
            ring_size,
            fft_size,
            channel_count,
            frame_size = geometry.frame_size,
            region_bytes = region_len,
            reused,
            "shared spectrum ring open"
        );
        Ok(producer)
    }

    fn atomics(&self) -> HeaderAtomics<'_> {
        debug_assert!(self.mmap.len() >= HEADER_SIZE);
        // SAFETY: base points at a live mapping of region_len >= HEADER_SIZE bytes
        // borrowed for the lifetime of &self
        unsafe { HeaderAtomics::at(self.base) }
    }

    /// Publish one frame. Never blocks and never fails.
    ///
    /// Returns the ring index the frame was written at.
    pub fn publish(&mut self, frame: &SpectrumFrame) -> u64 {
        let atomics = self.atomics();
        let w = atomics.write_index.load(Ordering::Relaxed);
        let range = self.geometry.slot_range(w);
        debug_assert!(range.end <= self.mmap.len());

        // orders the previous index store before this slot is overwritten
        fence(Ordering::Release);

        // SAFETY: slot_range stays within region_len, the mapping is live, and this
        // producer is the only writer of slot bytes
        let slot = unsafe {
            std::slice::from_raw_parts_mut(self.base.add(range.start), range.len())
        };
        layout::encode_slot(&self.geometry, frame, slot);

        atomics
            .sample_rate
            .store(frame.sample_rate.to_bits(), Ordering::Relaxed);
        atomics
            .gps_locked
            .store(u8::from(frame.flags.gps_locked), Ordering::Relaxed);

        fence(Ordering::Release);
        atomics.write_index.store(w + 1, Ordering::Release);
        self.published += 1;
        w
    }

    /// Current `write_index`.
    #[must_use]
    pub fn write_index(&self) -> u64 {
        self.atomics().write_index.load(Ordering::Relaxed)
    }

    /// Frames published by this producer.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Region geometry.
    #[must_use]
    pub fn geometry(&self) -> &RingGeometry {
        &self.geometry
    }

    /// Region path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clear the streaming flag, then unlink the region. The mapping is released
    /// when the producer is dropped.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.atomics().streaming.store(0, Ordering::Release);
        if let Err(e) = self.mmap.flush_async() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush shared ring");
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(
            path = %self.path.display(),
            published = self.published,
            "shared spectrum ring closed"
        );
        Ok(())
    }
}

impl Drop for RingProducer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to unlink shared ring");
        }
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// Result of one [`RingConsumer::try_read_into`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Nothing new since the last read.
    Empty,
    /// A frame was decoded; `dropped` frames were skipped before it.
    Frame {
        /// Frames lost to overrun since the previous delivered frame, including
        /// skips made by reads that came back empty.
        dropped: u64,
    },
}

/// A frame read by [`RingConsumer::try_read`].
#[derive(Debug, Clone, PartialEq)]
pub struct RingRead {
    /// Decoded frame with every channel the producer carried.
    pub frame: SpectrumFrame,
    /// Frames skipped immediately before this one.
    pub dropped: u64,
}

/// Reader counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerStats {
    /// Frames successfully read.
    pub frames_read: u64,
    /// Frames lost to overruns.
    pub frames_dropped: u64,
    /// Number of skip-ahead events.
    pub overrun_events: u64,
    /// Copies discarded because the producer wrapped during the read.
    pub torn_reads: u64,
}

/// Independent reader of a shared frame ring.
///
/// The mapping is read-only. Readers start at the producer's current
/// `write_index`: only frames published after attaching are delivered.
pub struct RingConsumer {
    path: PathBuf,
    /// Keeps the mapping alive; accessed through `base`.
    mmap: Mmap,
    /// SAFETY: start of `mmap`, valid for `geometry.region_len()` bytes while `mmap` lives
    base: *const u8,
    geometry: RingGeometry,
    cursor: u64,
    /// Frames skipped by overruns not yet reported through [`ReadStatus::Frame`].
    pending_dropped: u64,
    scratch: Vec<u8>,
    stats: ConsumerStats,
    #[cfg(test)]
    on_copied: Option<Box<dyn FnMut()>>,
}

// SAFETY: the consumer owns its read-only mapping and only reads through it.
unsafe impl Send for RingConsumer {}

impl std::fmt::Debug for RingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingConsumer")
            .field("path", &self.path)
            .field("geometry", &self.geometry)
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish()
    }
}

impl RingConsumer {
    /// Attach to the region at `path`.
    ///
    /// Fails without touching slot data when the magic, version or size do not
    /// match.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file.metadata()?.len() as usize;
        if len < HEADER_SIZE {
            return Err(StorageError::RegionTooSmall {
                len,
                required: HEADER_SIZE,
            });
        }

        // SAFETY: read-only mapping of an existing file of `len` bytes; the
        // producer never shrinks a live region
        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .map_err(|source| StorageError::Map {
                    path: path.to_path_buf(),
                    source,
                })?
        };

        let geometry = RegionHeader::decode(&mmap[..HEADER_SIZE])?.validate()?;
        if mmap.len() < geometry.region_len() {
            return Err(StorageError::RegionTooSmall {
                len: mmap.len(),
                required: geometry.region_len(),
            });
        }

        let base = mmap.as_ptr();
        let mut consumer = Self {
            path: path.to_path_buf(),
            mmap,
            base,
            geometry,
            cursor: 0,
            pending_dropped: 0,
            scratch: vec![0u8; geometry.frame_size],
            stats: ConsumerStats::default(),
            #[cfg(test)]
            on_copied: None,
        };
        consumer.cursor = consumer.atomics().write_index.load(Ordering::Acquire);

        tracing::debug!(
            path = %consumer.path.display(),
            cursor = consumer.cursor,
            ring_size = geometry.ring_size,
            fft_size = geometry.fft_size,
            "attached to shared spectrum ring"
        );
        Ok(consumer)
    }

    fn atomics(&self) -> HeaderAtomics<'_> {
        debug_assert!(self.mmap.len() >= HEADER_SIZE);
        // SAFETY: base points at a live mapping of at least HEADER_SIZE bytes
        // borrowed for the lifetime of &self
        unsafe { HeaderAtomics::at(self.base) }
    }

    /// Read the next unread frame into `frame`, reusing its allocations.
    pub fn try_read_into(&mut self, frame: &mut SpectrumFrame) -> ReadStatus {
        let ring = self.geometry.ring_size as u64;

        for _ in 0..MAX_READ_ATTEMPTS {
            let w = self.atomics().write_index.load(Ordering::Acquire);
            if w < self.cursor {
                // region was reinitialized behind this reader
                self.cursor = w;
            }
            if w == self.cursor {
                return ReadStatus::Empty;
            }

            if w - self.cursor >= ring {
                let skip_to = w - 1;
                let skipped = skip_to - self.cursor;
                self.pending_dropped += skipped;
                self.stats.frames_dropped += skipped;
                self.stats.overrun_events += 1;
                tracing::warn!(
                    path = %self.path.display(),
                    dropped = skipped,
                    write_index = w,
                    "ring reader overrun, skipping ahead"
                );
                self.cursor = skip_to;
            }

            let n = self.cursor;
            let range = self.geometry.slot_range(n);
            debug_assert!(range.end <= self.mmap.len());
            // SAFETY: slot_range stays within the validated region length and the
            // mapping is live; concurrent producer writes are detected below
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.base.add(range.start),
                    self.scratch.as_mut_ptr(),
                    range.len(),
                );
            }
            fence(Ordering::Acquire);
            #[cfg(test)]
            if let Some(hook) = &mut self.on_copied {
                hook();
            }
            let w2 = self.atomics().write_index.load(Ordering::Acquire);

            if w2.saturating_sub(n) >= ring {
                self.stats.torn_reads += 1;
                tracing::debug!(frame = n, write_index = w2, "torn ring read discarded");
                continue;
            }

            layout::decode_slot(&self.geometry, &self.scratch, frame);
            self.cursor = n + 1;
            self.stats.frames_read += 1;
            return ReadStatus::Frame {
                dropped: std::mem::take(&mut self.pending_dropped),
            };
        }
        ReadStatus::Empty
    }

    /// Read the next unread frame, allocating a fresh [`SpectrumFrame`].
    pub fn try_read(&mut self) -> Option<RingRead> {
        let mut frame = SpectrumFrame::default();
        match self.try_read_into(&mut frame) {
            ReadStatus::Empty => None,
            ReadStatus::Frame { dropped } => Some(RingRead { frame, dropped }),
        }
    }

    /// True while the producer is attached.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.atomics().streaming.load(Ordering::Acquire) != 0
    }

    /// Sample rate of the most recent frame.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.atomics().sample_rate.load(Ordering::Acquire))
    }

    /// GPS lock of the most recent frame.
    #[must_use]
    pub fn gps_locked(&self) -> bool {
        self.atomics().gps_locked.load(Ordering::Acquire) != 0
    }

    /// Producer's current `write_index`.
    #[must_use]
    pub fn write_index(&self) -> u64 {
        self.atomics().write_index.load(Ordering::Acquire)
    }

    /// Index of the next frame this reader will deliver.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Region geometry.
    #[must_use]
    pub fn geometry(&self) -> &RingGeometry {
        &self.geometry
    }

    /// Reader counters.
    #[must_use]
    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_core::ChannelSpectrum;

    fn frame(n: u64, fft_size: usize) -> SpectrumFrame {
        SpectrumFrame {
            frame_number: n,
            timestamp: n as f64 * 0.001,
            center_freq: 915e6,
            sample_rate: 10e6,
            fft_size: fft_size as u32,
            channels: vec![ChannelSpectrum {
                spectrum: vec![n as f32; fft_size],
                peak_bin: 7,
                peak_power: -1.0,
            }],
            ..SpectrumFrame::default()
        }
    }

    #[test]
    fn test_new_reader_starts_now() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let mut producer = RingProducer::open(&path, 8, 64, 1).unwrap();
        for n in 0..3 {
            producer.publish(&frame(n, 64));
        }

        let mut consumer = RingConsumer::open(&path).unwrap();
        assert_eq!(consumer.cursor(), 3);
        assert!(consumer.try_read().is_none());

        producer.publish(&frame(3, 64));
        let read = consumer.try_read().unwrap();
        assert_eq!(read.frame.frame_number, 3);
        assert_eq!(read.dropped, 0);
        assert!(consumer.is_streaming());
        assert_eq!(consumer.sample_rate(), 10e6);
    }

    #[test]
    fn test_overrun_reads_latest_and_reports_one_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let ring = 8u64;
        let writes = 20u64;
        let mut producer = RingProducer::open(&path, ring as usize, 64, 1).unwrap();
        let mut consumer = RingConsumer::open(&path).unwrap();

        for n in 0..writes {
            producer.publish(&frame(n, 64));
        }

        let read = consumer.try_read().unwrap();
        assert_eq!(read.frame.frame_number, writes - 1);
        assert_eq!(read.dropped, writes - 1);
        assert!(consumer.try_read().is_none());

        let stats = consumer.stats();
        assert_eq!(stats.overrun_events, 1);
        assert_eq!(stats.frames_read, 1);
    }

    #[test]
    fn test_skipped_frames_survive_exhausted_retries() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let producer = Rc::new(RefCell::new(RingProducer::open(&path, 4, 64, 1).unwrap()));
        let mut consumer = RingConsumer::open(&path).unwrap();
        for n in 0..10 {
            producer.borrow_mut().publish(&frame(n, 64));
        }

        // lap the reader during every copy so each attempt is torn
        let lapping = Rc::clone(&producer);
        let mut next = 10u64;
        consumer.on_copied = Some(Box::new(move || {
            for _ in 0..4 {
                lapping.borrow_mut().publish(&frame(next, 64));
                next += 1;
            }
        }));
        assert!(consumer.try_read().is_none());
        assert_eq!(consumer.stats().torn_reads, MAX_READ_ATTEMPTS as u64);
        assert_eq!(consumer.stats().frames_read, 0);

        consumer.on_copied = None;
        let read = consumer.try_read().unwrap();
        assert_eq!(read.frame.frame_number, 41);
        assert_eq!(read.dropped, 41);
        assert_eq!(consumer.stats().frames_dropped, 41);
    }

    #[test]
    fn test_boundary_gap_of_exactly_ring_size_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let mut producer = RingProducer::open(&path, 4, 64, 1).unwrap();
        let mut consumer = RingConsumer::open(&path).unwrap();

        for n in 0..4 {
            producer.publish(&frame(n, 64));
        }
        let read = consumer.try_read().unwrap();
        assert_eq!(read.frame.frame_number, 3);
        assert_eq!(read.dropped, 3);
    }

    #[test]
    fn test_gap_below_ring_size_reads_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let mut producer = RingProducer::open(&path, 4, 64, 1).unwrap();
        let mut consumer = RingConsumer::open(&path).unwrap();

        for n in 0..3 {
            producer.publish(&frame(n, 64));
        }
        for n in 0..3 {
            let read = consumer.try_read().unwrap();
            assert_eq!(read.frame.frame_number, n);
            assert_eq!(read.dropped, 0);
        }
        assert!(consumer.try_read().is_none());
    }

    #[test]
    fn test_fast_reader_sees_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let mut producer = RingProducer::open(&path, 16, 64, 1).unwrap();
        let mut consumer = RingConsumer::open(&path).unwrap();

        let mut seen = Vec::new();
        for n in 0..16 {
            producer.publish(&frame(n, 64));
            while let Some(read) = consumer.try_read() {
                assert_eq!(read.dropped, 0);
                seen.push(read.frame.frame_number);
            }
        }
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_close_clears_streaming_and_unlinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let producer = RingProducer::open(&path, 4, 64, 1).unwrap();
        let consumer = RingConsumer::open(&path).unwrap();
        assert!(consumer.is_streaming());

        producer.close().unwrap();
        assert!(!path.exists());
        assert!(!consumer.is_streaming());
    }

    #[test]
    fn test_incompatible_existing_region_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let first = RingProducer::open(&path, 4, 64, 1).unwrap();
        std::mem::forget(first);

        let err = RingProducer::open(&path, 4, 128, 1).unwrap_err();
        assert!(matches!(err, StorageError::IncompatibleRegion { .. }));

        let garbage = dir.path().join("garbage");
        std::fs::write(&garbage, vec![0x55u8; 4096]).unwrap();
        let err = RingProducer::open(&garbage, 4, 64, 1).unwrap_err();
        assert!(matches!(err, StorageError::IncompatibleRegion { .. }));
    }

    #[test]
    fn test_matching_region_is_reused_and_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring");
        let mut first = RingProducer::open(&path, 4, 64, 1).unwrap();
        first.publish(&frame(0, 64));
        first.publish(&frame(1, 64));
        std::mem::forget(first);

        let second = RingProducer::open(&path, 4, 64, 1).unwrap();
        assert_eq!(second.write_index(), 2);
    }

    #[test]
    fn test_consumer_rejects_foreign_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert!(matches!(
            RingConsumer::open(&path),
            Err(StorageError::BadMagic { found: 0 })
        ));

        let short = dir.path().join("short");
        std::fs::write(&short, [0u8; 8]).unwrap();
        assert!(matches!(
            RingConsumer::open(&short),
            Err(StorageError::RegionTooSmall { .. })
        ));
    }
}
