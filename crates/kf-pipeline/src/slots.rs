//! Concurrency slot pool.
//!
//! The pool is the only state shared between jobs. A [`Slot`] is an owned
//! semaphore permit, so it is released exactly once when dropped, whatever
//! path the job takes.

use std::sync::Arc;

use kf_core::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of job slots. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot; dropping it returns the slot to the pool.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl SlotPool {
    /// Create a pool of `capacity` slots. Zero is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Validation(
                "slot pool capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait until a slot is free. Waiters are served in FIFO order.
    pub async fn acquire(&self) -> Result<Slot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("slot pool closed".into()))?;
        Ok(Slot { _permit: permit })
    }

    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
