//! Admission gate bounding concurrent recognition sessions.

use std::sync::Arc;

use metrics::gauge;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::types::RecognitionError;

/// Active sessions gauge name.
pub const SESSIONS_ACTIVE: &str = "recognition_sessions_active";

/// Counting limiter over recognition sessions.
///
/// Waiters are admitted in FIFO order (tokio's semaphore is fair), so no
/// waiter is dropped while the gate is open.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate with `max_concurrency` permits (at least one).
    pub fn new(max_concurrency: usize) -> Self {
        let capacity = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free permit.
    pub async fn acquire(&self) -> Result<AdmissionSlot, RecognitionError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RecognitionError::GateClosed)?;
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        debug!(in_flight = self.in_flight(), capacity = self.capacity, "admission slot acquired");
        Ok(AdmissionSlot { _permit: permit })
    }

    /// Wait until every slot has been returned.
    ///
    /// Takes all permits at once and gives them straight back, so requests
    /// queued behind the call are admitted afterwards in order.
    pub async fn drained(&self) -> Result<(), RecognitionError> {
        let all = u32::try_from(self.capacity).map_err(|_| RecognitionError::GateClosed)?;
        let _all = self
            .semaphore
            .acquire_many(all)
            .await
            .map_err(|_| RecognitionError::GateClosed)?;
        Ok(())
    }

    /// Configured number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// A held permit. Returned to the gate exactly once, when dropped.
///
/// Each slot adds one to the `recognition_sessions_active` gauge while alive.
#[derive(Debug)]
pub struct AdmissionSlot {
    /// RAII guard, released when the slot is dropped.
    _permit: OwnedSemaphorePermit,
}

impl AdmissionSlot {
    /// Return the permit now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
    }
}
