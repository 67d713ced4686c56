//! Unix-socket control server.
//!
//! The server owns one dedicated thread running a current-thread Tokio runtime.
//! Connections are served one at a time; every wait is bounded by the poll
//! interval so cancellation is observed promptly in both the accept loop and an
//! open connection.

use crate::error::{ControlError, Result};
use crate::handler::ControlHandler;
use crate::protocol::{ControlRequest, ControlResponse, REQUEST_LEN};
use sdr_core::limits::{CONTROL_IDLE_TIMEOUT, CONTROL_POLL_INTERVAL};
use sdr_core::CancellationToken;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;

/// Control server configuration plus its command handler.
pub struct ControlServer {
    socket_path: PathBuf,
    poll_interval: Duration,
    idle_timeout: Duration,
    handler: ControlHandler,
}

impl ControlServer {
    /// New server for `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>, handler: ControlHandler) -> Self {
        Self {
            socket_path: socket_path.into(),
            poll_interval: CONTROL_POLL_INTERVAL,
            idle_timeout: CONTROL_IDLE_TIMEOUT,
            handler,
        }
    }

    /// Override the accept/read poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override how long an idle connection is kept open.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = idle;
        self
    }

    /// Bind the socket and start serving on the "control-plane" thread.
    ///
    /// Binding happens on the calling thread so failures surface here. A stale
    /// socket file left by a crashed process is replaced; a live one is not.
    /// The server exits when `cancel` (or the returned handle) is cancelled.
    pub fn spawn(self, cancel: &CancellationToken) -> Result<ControlServerHandle> {
        let listener = bind(&self.socket_path)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ControlError::Startup)?;

        let token = cancel.child_token();
        let thread_token = token.clone();
        let path = self.socket_path.clone();

        let thread = std::thread::Builder::new()
            .name("control-plane".into())
            .spawn(move || {
                runtime.block_on(self.run(listener, thread_token));
            })
            .map_err(ControlError::Startup)?;

        tracing::info!(socket = %path.display(), "Control server listening");
        Ok(ControlServerHandle {
            path,
            cancel: token,
            thread: Some(thread),
        })
    }

    async fn run(self, listener: std::os::unix::net::UnixListener, cancel: CancellationToken) {
        match UnixListener::from_std(listener) {
            Ok(listener) => self.accept_loop(&listener, &cancel).await,
            Err(e) => tracing::error!(error = %e, "Failed to register control socket"),
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(socket = %self.socket_path.display(), error = %e, "Failed to remove control socket");
            }
        }
        tracing::info!("Control server stopped");
    }

    async fn accept_loop(&self, listener: &UnixListener, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            match timeout(self.poll_interval, listener.accept()).await {
                Err(_) => continue,
                Ok(Ok((stream, _))) => {
                    tracing::debug!("Control client connected");
                    self.serve(stream, cancel).await;
                    tracing::debug!("Control client disconnected");
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Control accept failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Serve sequential requests on one connection until it closes, idles out
    /// or the server is cancelled.
    async fn serve(&self, mut stream: UnixStream, cancel: &CancellationToken) {
        let mut request = [0u8; REQUEST_LEN];
        let mut filled = 0;
        let mut idle = Duration::ZERO;

        while !cancel.is_cancelled() {
            // `read` is cancel safe, so a timed-out wait loses no bytes.
            let n = match timeout(self.poll_interval, stream.read(&mut request[filled..])).await {
                Err(_) => {
                    idle += self.poll_interval;
                    if idle >= self.idle_timeout {
                        tracing::debug!("Closing idle control connection");
                        return;
                    }
                    continue;
                }
                Ok(Ok(0)) => return,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Control read failed");
                    return;
                }
            };

            idle = Duration::ZERO;
            filled += n;
            if filled < REQUEST_LEN {
                continue;
            }
            filled = 0;

            let response = match ControlRequest::decode(&request) {
                Ok(req) => {
                    tracing::debug!(command = ?req.command, value = req.value, "Control request");
                    self.handler.handle(req)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed control request");
                    ControlResponse::rejected(0.0, e.to_string())
                }
            };

            if let Err(e) = stream.write_all(&response.encode()).await {
                tracing::debug!(error = %e, "Control write failed");
                return;
            }
        }
    }
}

fn bind(path: &Path) -> Result<std::os::unix::net::UnixListener> {
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            return Err(ControlError::AddrInUse {
                path: path.to_path_buf(),
            });
        }
        tracing::warn!(socket = %path.display(), "Removing stale control socket");
        std::fs::remove_file(path).map_err(|source| ControlError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let listener =
        std::os::unix::net::UnixListener::bind(path).map_err(|source| ControlError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Running control server.
///
/// Dropping the handle stops the server and waits for its thread.
pub struct ControlServerHandle {
    path: PathBuf,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl ControlServerHandle {
    /// Socket path being served.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while the server thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the server and wait for it to exit. The socket file is removed.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ControlError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for ControlServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "Control server did not shut down cleanly");
        }
    }
}
