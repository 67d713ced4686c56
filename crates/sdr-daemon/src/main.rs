//! `sdr-daemon` entry point.
//!
//! Loads layered configuration (defaults, `config/sdr.toml` or `$SDR_CONFIG`,
//! then `SDR_*` environment variables) and runs the pipeline against the
//! simulated front end. Logs go to stderr; stdout carries the data stream.

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use sdr_core::radio::share;
use sdr_core::{CancellationToken, SdrConfig};
use sdr_daemon::{Daemon, RunSummary};
use sdr_driver_mock::MockRadio;
use tracing_subscriber::EnvFilter;

const MOCK_SEED: u64 = 0x5344_5246;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SdrConfig::load().context("Failed to load configuration")?;
    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let radio = share(MockRadio::new(MOCK_SEED).paced(true));
    let daemon = Daemon::new(config, radio, cancel);

    let summary = tokio::task::spawn_blocking(move || daemon.run())
        .await
        .context("Acquisition thread panicked")?
        .context("Daemon failed")?;

    match summary {
        RunSummary::Stream(s) => tracing::info!(frames = s.frames, overflows = s.overflows, "Daemon finished"),
        RunSummary::Scan(s) => tracing::info!(steps = s.steps, detections = s.detections.len(), "Sweep finished"),
    }
    Ok(())
}

async fn watch_signals(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
