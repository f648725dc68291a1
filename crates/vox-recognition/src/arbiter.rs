//! One-shot completion cell and the timeout race.
//!
//! Engine callbacks and the timer both write into the same single-assignment
//! cell. The first writer wins; the waiter always reads back whatever won, so
//! an event that lands just before the deadline is never replaced by
//! `Timeout`, and the cell never resolves twice.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::types::RecognitionOutcome;

struct Slot<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

/// Write side of a completion cell. Cheap to clone; every clone shares the slot.
pub struct Completer<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Completer<T> {
    /// Store `value` if the cell is still empty. Returns `true` for the winning write.
    pub fn complete(&self, value: T) -> bool {
        let Some(tx) = self.slot.tx.lock().take() else {
            return false;
        };
        // The reader may be gone; the slot is consumed either way.
        let _ = tx.send(value);
        true
    }

    /// Whether some writer already won.
    pub fn is_completed(&self) -> bool {
        self.slot.tx.lock().is_none()
    }
}

/// Read side of a completion cell.
pub struct Completion<T> {
    slot: Arc<Slot<T>>,
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Another writer for the same cell.
    pub fn completer(&self) -> Completer<T> {
        Completer {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Wait for the winning value.
    ///
    /// The completion keeps a writer alive itself, so this only returns once
    /// some writer has completed the cell.
    pub async fn wait(self) -> T {
        let Self { slot, rx } = self;
        match rx.await {
            Ok(value) => value,
            // Unreachable while `slot` holds the sender; keep the type total.
            Err(_) => {
                drop(slot);
                std::future::pending().await
            }
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("completed", &self.slot.tx.lock().is_none())
            .finish_non_exhaustive()
    }
}

/// Create an empty completion cell.
pub fn completion_cell<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    let slot = Arc::new(Slot {
        tx: Mutex::new(Some(tx)),
    });
    (
        Completer {
            slot: Arc::clone(&slot),
        },
        Completion { slot, rx },
    )
}

/// Race the session's terminal event against `timeout`.
///
/// On expiry the timer writes [`RecognitionOutcome::Timeout`] into the cell;
/// if an event got there first the write loses and the event is returned.
/// Stopping the session is the caller's job.
pub async fn race_until(
    completion: Completion<RecognitionOutcome>,
    timeout: Duration,
) -> RecognitionOutcome {
    let timer = completion.completer();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let wait = completion.wait();
    tokio::pin!(wait);

    tokio::select! {
        biased;
        outcome = &mut wait => outcome,
        () = &mut deadline => {
            if timer.complete(RecognitionOutcome::Timeout) {
                debug!(timeout = ?timeout, "recognition deadline reached");
            } else {
                debug!("deadline reached after a terminal event, keeping the event");
            }
            wait.await
        }
    }
}
