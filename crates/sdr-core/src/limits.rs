//! Shared hard limits and protocol constants.
//!
//! Centralizing these keeps the engine, the shared-memory layout, the control
//! protocol and configuration validation in agreement.

use std::time::Duration;

// =============================================================================
// Spectrum
// =============================================================================

/// Smallest accepted FFT size.
pub const MIN_FFT_SIZE: usize = 16;

/// Largest accepted FFT size.
///
/// Bounded so every bin index fits in the `i16` peak descriptor.
pub const MAX_FFT_SIZE: usize = 32768;

/// Floor added to linear power before the dB conversion.
pub const POWER_FLOOR: f64 = 1e-20;

/// Maximum number of channels carried by one frame.
pub const MAX_CHANNELS: usize = 2;

// =============================================================================
// Shared memory
// =============================================================================

/// Magic tag at offset 0 of the shared region ("SDRF").
pub const RING_MAGIC: u32 = 0x5344_5246;

/// Shared region layout version.
pub const RING_VERSION: u32 = 1;

/// Default number of frame slots in the ring.
pub const DEFAULT_RING_SIZE: usize = 64;

/// Smallest usable ring.
pub const MIN_RING_SIZE: usize = 2;

/// Default region name.
pub const DEFAULT_SHM_NAME: &str = "sdr_fft_buffer";

/// Default directory backing named shared-memory regions.
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

// =============================================================================
// Control plane
// =============================================================================

/// Well-known control socket path.
pub const DEFAULT_CONTROL_SOCKET: &str = "/tmp/sdr_control.sock";

/// Fixed length of the response text field.
pub const CONTROL_MESSAGE_LEN: usize = 64;

/// Accept-loop poll interval; bounds shutdown latency of the control thread.
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Idle connections are closed after this long without a request. Connections
/// are served one at a time, so this bounds how long an idle client can delay
/// a STOP from another.
pub const CONTROL_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// Acquisition
// =============================================================================

/// Default bounded timeout for one block fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Default interval between status records.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Wake interval of the block writer thread while idle.
pub const WRITER_WAKE_INTERVAL: Duration = Duration::from_millis(100);

/// Returns true when `n` is an accepted FFT size.
#[must_use]
pub fn is_valid_fft_size(n: usize) -> bool {
    n.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_size_bounds() {
        assert!(is_valid_fft_size(16));
        assert!(is_valid_fft_size(2048));
        assert!(is_valid_fft_size(MAX_FFT_SIZE));
        assert!(!is_valid_fft_size(8));
        assert!(!is_valid_fft_size(1000));
        assert!(!is_valid_fft_size(MAX_FFT_SIZE * 2));
    }

    #[test]
    fn test_max_fft_bin_fits_peak_descriptor() {
        assert!(MAX_FFT_SIZE - 1 <= i16::MAX as usize);
    }
}
