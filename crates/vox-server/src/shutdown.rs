//! Graceful shutdown: stop accepting requests, then drain recognition sessions.
//!
//! The listener stops on token cancellation and finishes once open requests
//! have been answered. Sessions whose request was dropped keep their slot
//! until the engine has stopped, so the drain also waits for the admission
//! gate to empty.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vox_recognition::gate::AdmissionGate;

/// Default time allowed for recognition sessions to drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The listener finished and every slot was returned.
    Drained,
    /// The deadline passed first; the listener was aborted.
    TimedOut {
        /// Sessions still holding a slot at the deadline.
        abandoned_sessions: usize,
    },
}

/// Coordinates shutdown of the listener and the sessions behind it.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token the listener stops on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop accepting requests.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` for `listener` to finish
    /// and for `gate` to have no slot in use.
    pub async fn drain(
        &self,
        listener: JoinHandle<()>,
        gate: &AdmissionGate,
        timeout: Option<Duration>,
    ) -> ShutdownOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let abort = listener.abort_handle();

        self.shutdown();
        info!(
            in_flight = gate.in_flight(),
            timeout_secs = timeout.as_secs(),
            "draining recognition sessions"
        );

        let drained = async {
            if let Err(e) = listener.await {
                warn!(error = %e, "listener task ended abnormally");
            }
            // Only fails if the gate is closed, which leaves nothing to wait for.
            let _ = gate.drained().await;
        };

        if tokio::time::timeout(timeout, drained).await.is_ok() {
            info!("recognition sessions drained");
            return ShutdownOutcome::Drained;
        }

        abort.abort();
        let abandoned_sessions = gate.in_flight();
        warn!(
            abandoned_sessions,
            "shutdown timed out after {timeout:?}, aborting listener"
        );
        ShutdownOutcome::TimedOut { abandoned_sessions }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
