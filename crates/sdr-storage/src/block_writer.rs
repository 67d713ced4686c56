//! Asynchronous raw IQ block writer.
//!
//! Decouples disk persistence from the acquisition hot path. A fixed pool of
//! pre-allocated [`WriteBlock`]s cycles between a free list and a pending queue;
//! the caller fills free blocks and queues them, a dedicated thread drains the
//! queue into the sink and recycles the blocks.
//!
//! ```text
//!            write()                      writer thread
//! free list ─────────► pending queue ─────────────────► sink ──┐
//!     ▲                                                        │
//!     └────────────────────── recycled block ──────────────────┘
//! ```
//!
//! [`BlockWriter::write`] never blocks: when the free list is empty the rest of
//! the input is dropped and counted, so sustained overload costs bounded data,
//! never a stalled acquisition loop. Each lock is held only for one O(1) push
//! or pop and the two locks are never nested.
//!
//! Samples are written as interleaved little-endian `f32` I/Q pairs (`cf32_le`).

use crate::error::{Result, StorageError};
use bytes::{BufMut, BytesMut};
use parking_lot::{Condvar, Mutex};
use sdr_core::limits::WRITER_WAKE_INTERVAL;
use sdr_core::Complex32;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Bytes per complex sample on disk.
pub const BYTES_PER_SAMPLE: usize = 8;

/// Fixed-capacity sample chunk. Owned by exactly one of: the free list, the
/// pending queue, or the writer thread.
#[derive(Debug)]
pub struct WriteBlock {
    buf: BytesMut,
    samples: usize,
}

impl WriteBlock {
    fn with_capacity(samples: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(samples * BYTES_PER_SAMPLE),
            samples: 0,
        }
    }

    fn fill(&mut self, samples: &[Complex32]) {
        self.buf.clear();
        for s in samples {
            self.buf.put_f32_le(s.re);
            self.buf.put_f32_le(s.im);
        }
        self.samples = samples.len();
    }

    fn recycle(&mut self) {
        self.buf.clear();
        self.samples = 0;
    }
}

/// Writer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Samples appended to the sink.
    pub samples_written: u64,
    /// Bytes appended to the sink.
    pub bytes_written: u64,
    /// Blocks' worth of samples discarded because the pool was exhausted.
    pub dropped_blocks: u64,
    /// Blocks currently queued for writing.
    pub queue_depth: usize,
    /// Failed sink writes or flushes.
    pub write_errors: u64,
}

struct Shared {
    free: Mutex<Vec<WriteBlock>>,
    pending: Mutex<VecDeque<WriteBlock>>,
    available: Condvar,
    stop: AtomicBool,
    samples_written: AtomicU64,
    bytes_written: AtomicU64,
    dropped_blocks: AtomicU64,
    write_errors: AtomicU64,
}

/// Builder for [`BlockWriter`].
#[derive(Debug, Clone)]
pub struct BlockWriterBuilder {
    block_samples: usize,
    pool_blocks: usize,
}

impl Default for BlockWriterBuilder {
    fn default() -> Self {
        Self {
            block_samples: 65_536,
            pool_blocks: 32,
        }
    }
}

impl BlockWriterBuilder {
    /// Samples per pooled block.
    pub fn block_samples(mut self, samples: usize) -> Self {
        self.block_samples = samples;
        self
    }

    /// Number of pre-allocated blocks.
    pub fn pool_blocks(mut self, blocks: usize) -> Self {
        self.pool_blocks = blocks;
        self
    }

    /// Record into a newly created (truncated) file at `path`.
    pub fn open(self, path: &Path) -> Result<BlockWriter> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| StorageError::OpenRecording {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "recording IQ samples");
        self.sink(Box::new(file))
    }

    /// Record into an arbitrary sink.
    pub fn sink(self, sink: Box<dyn Write + Send>) -> Result<BlockWriter> {
        if self.block_samples == 0 || self.pool_blocks == 0 {
            return Err(StorageError::InvalidWriterConfig(format!(
                "block_samples ({}) and pool_blocks ({}) must be non-zero",
                self.block_samples, self.pool_blocks
            )));
        }

        let free = (0..self.pool_blocks)
            .map(|_| WriteBlock::with_capacity(self.block_samples))
            .collect();
        let shared = Arc::new(Shared {
            free: Mutex::new(free),
            pending: Mutex::new(VecDeque::with_capacity(self.pool_blocks)),
            available: Condvar::new(),
            stop: AtomicBool::new(false),
            samples_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            dropped_blocks: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("iq-writer".to_string())
            .spawn(move || writer_loop(&thread_shared, sink))
            .map_err(StorageError::Spawn)?;

        tracing::debug!(
            block_samples = self.block_samples,
            pool_blocks = self.pool_blocks,
            pool_mb = (self.block_samples * self.pool_blocks * BYTES_PER_SAMPLE) as f64
                / (1024.0 * 1024.0),
            "block writer started"
        );

        Ok(BlockWriter {
            shared,
            handle: Some(handle),
            block_samples: self.block_samples,
            pool_blocks: self.pool_blocks,
        })
    }
}

/// Pooled asynchronous sample writer.
pub struct BlockWriter {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    block_samples: usize,
    pool_blocks: usize,
}

impl std::fmt::Debug for BlockWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockWriter")
            .field("block_samples", &self.block_samples)
            .field("pool_blocks", &self.pool_blocks)
            .field("stats", &self.stats())
            .finish()
    }
}

impl BlockWriter {
    /// Start configuring a writer.
    pub fn builder() -> BlockWriterBuilder {
        BlockWriterBuilder::default()
    }

    /// Queue `samples` for writing without blocking.
    ///
    /// Returns how many samples were queued. A return below `samples.len()`
    /// means the pool ran dry; the remainder is dropped and counted in
    /// [`WriterStats::dropped_blocks`].
    pub fn write(&self, samples: &[Complex32]) -> usize {
        let mut queued = 0;
        while queued < samples.len() {
            let block = self.shared.free.lock().pop();
            let Some(mut block) = block else {
                break;
            };
            let take = self.block_samples.min(samples.len() - queued);
            block.fill(&samples[queued..queued + take]);
            queued += take;

            self.shared.pending.lock().push_back(block);
            self.shared.available.notify_one();
        }

        if queued < samples.len() {
            let shortfall = (samples.len() - queued).div_ceil(self.block_samples) as u64;
            let total = self
                .shared
                .dropped_blocks
                .fetch_add(shortfall, Ordering::Relaxed)
                + shortfall;
            // first drop, then once per 100 dropped blocks
            if total == shortfall || total / 100 != (total - shortfall) / 100 {
                tracing::warn!(
                    dropped = shortfall,
                    dropped_total = total,
                    "write pool exhausted, recording has a gap"
                );
            }
        }
        queued
    }

    /// Blocks waiting for the writer thread.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            samples_written: self.shared.samples_written.load(Ordering::Relaxed),
            bytes_written: self.shared.bytes_written.load(Ordering::Relaxed),
            dropped_blocks: self.shared.dropped_blocks.load(Ordering::Relaxed),
            queue_depth: self.queue_depth(),
            write_errors: self.shared.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Signal stop, wait for the queue to drain and the sink to flush.
    pub fn stop(mut self) -> WriterStats {
        self.shutdown();
        self.stats()
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let _pending = self.shared.pending.lock();
            self.shared.stop.store(true, Ordering::Release);
        }
        self.shared.available.notify_all();

        if let Err(e) = handle.join() {
            tracing::error!("writer thread panicked: {:?}", e);
        }
        let stats = self.stats();
        tracing::info!(
            samples = stats.samples_written,
            bytes = stats.bytes_written,
            dropped_blocks = stats.dropped_blocks,
            write_errors = stats.write_errors,
            "block writer stopped"
        );
    }
}

impl Drop for BlockWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn writer_loop(shared: &Shared, mut sink: Box<dyn Write + Send>) {
    loop {
        let block = {
            let mut pending = shared.pending.lock();
            loop {
                if let Some(block) = pending.pop_front() {
                    break Some(block);
                }
                if shared.stop.load(Ordering::Acquire) {
                    break None;
                }
                shared
                    .available
                    .wait_for(&mut pending, WRITER_WAKE_INTERVAL);
            }
        };
        let Some(mut block) = block else {
            break;
        };

        match sink.write_all(&block.buf) {
            Ok(()) => {
                shared
                    .samples_written
                    .fetch_add(block.samples as u64, Ordering::Relaxed);
                shared
                    .bytes_written
                    .fetch_add(block.buf.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                let errors = shared.write_errors.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(error = %e, errors, "recording write failed");
            }
        }

        block.recycle();
        shared.free.lock().push(block);
    }

    if let Err(e) = sink.flush() {
        shared.write_errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!(error = %e, "recording flush failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Condvar, Mutex};
    use std::sync::Arc;

    /// Sink that blocks every write until opened, capturing bytes.
    #[derive(Clone, Default)]
    struct GateSink {
        open: Arc<(Mutex<bool>, Condvar)>,
        data: Arc<Mutex<Vec<u8>>>,
    }

    impl GateSink {
        fn release(&self) {
            let (lock, cvar) = &*self.open;
            *lock.lock() = true;
            cvar.notify_all();
        }
    }

    impl Write for GateSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let (lock, cvar) = &*self.open;
            let mut open = lock.lock();
            while !*open {
                cvar.wait(&mut open);
            }
            self.data.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn ramp(n: usize) -> Vec<Complex32> {
        (0..n).map(|i| Complex32::new(i as f32, -(i as f32))).collect()
    }

    #[test]
    fn test_samples_land_in_order_as_cf32_le() {
        let sink = GateSink::default();
        sink.release();
        let writer = BlockWriter::builder()
            .block_samples(16)
            .pool_blocks(4)
            .sink(Box::new(sink.clone()))
            .unwrap();

        assert_eq!(writer.write(&ramp(40)), 40);
        let stats = writer.stop();
        assert_eq!(stats.samples_written, 40);
        assert_eq!(stats.bytes_written, 40 * 8);
        assert_eq!(stats.dropped_blocks, 0);

        let data = sink.data.lock();
        assert_eq!(data.len(), 320);
        let sample = |i: usize| {
            let re = f32::from_le_bytes(data[i * 8..i * 8 + 4].try_into().unwrap());
            let im = f32::from_le_bytes(data[i * 8 + 4..i * 8 + 8].try_into().unwrap());
            (re, im)
        };
        assert_eq!(sample(0), (0.0, 0.0));
        assert_eq!(sample(17), (17.0, -17.0));
        assert_eq!(sample(39), (39.0, -39.0));
    }

    #[test]
    fn test_exhausted_pool_reports_partial_write_and_drops() {
        let sink = GateSink::default();
        let block = 16;
        let pool = 4;
        let writer = BlockWriter::builder()
            .block_samples(block)
            .pool_blocks(pool)
            .sink(Box::new(sink.clone()))
            .unwrap();

        // 2.5 blocks more than the pool holds
        let request = pool * block + 2 * block + block / 2;
        let queued = writer.write(&ramp(request));
        assert_eq!(queued, pool * block);
        assert_eq!(writer.stats().dropped_blocks, 3);

        // still stalled: nothing comes back to the free list
        assert_eq!(writer.write(&ramp(block)), 0);
        assert_eq!(writer.stats().dropped_blocks, 4);

        sink.release();
        let stats = writer.stop();
        assert_eq!(stats.samples_written, (pool * block) as u64);
        assert_eq!(stats.queue_depth, 0);
        assert_eq!(sink.data.lock().len(), pool * block * BYTES_PER_SAMPLE);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_pool_exhaustion_is_logged() {
        let sink = GateSink::default();
        let writer = BlockWriter::builder()
            .block_samples(4)
            .pool_blocks(1)
            .sink(Box::new(sink.clone()))
            .unwrap();

        assert_eq!(writer.write(&ramp(12)), 4);
        assert!(logs_contain("write pool exhausted"));

        sink.release();
        writer.stop();
    }

    #[test]
    fn test_stop_drains_queue() {
        let sink = GateSink::default();
        let writer = BlockWriter::builder()
            .block_samples(8)
            .pool_blocks(8)
            .sink(Box::new(sink.clone()))
            .unwrap();

        for _ in 0..8 {
            assert_eq!(writer.write(&ramp(8)), 8);
        }
        let releaser = {
            let sink = sink.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(50));
                sink.release();
            })
        };
        let stats = writer.stop();
        releaser.join().unwrap();

        assert_eq!(stats.samples_written, 64);
        assert_eq!(sink.data.lock().len(), 64 * BYTES_PER_SAMPLE);
    }

    #[test]
    fn test_blocks_are_recycled() {
        let sink = GateSink::default();
        sink.release();
        let writer = BlockWriter::builder()
            .block_samples(4)
            .pool_blocks(2)
            .sink(Box::new(sink.clone()))
            .unwrap();

        let mut total = 0;
        for _ in 0..50 {
            // wait for the writer to hand blocks back
            while writer.write(&ramp(4)) == 0 {
                std::thread::yield_now();
            }
            total += 4;
        }
        let stats = writer.stop();
        assert_eq!(stats.samples_written, total);
    }

    #[test]
    fn test_file_sink_and_zero_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.cf32");
        let writer = BlockWriter::builder()
            .block_samples(32)
            .pool_blocks(2)
            .open(&path)
            .unwrap();
        assert_eq!(writer.write(&ramp(48)), 48);
        writer.stop();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 48 * 8);

        assert!(matches!(
            BlockWriter::builder().pool_blocks(0).sink(Box::new(std::io::sink())),
            Err(StorageError::InvalidWriterConfig(_))
        ));
    }
}
