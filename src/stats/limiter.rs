//! Bounded-concurrency permit pool for per-repository fetches.
//!
//! At most `max_concurrent` units of work run simultaneously, keeping both
//! local resource use and the shared rate quota in check.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits how many per-repository fetches are in flight at once.
///
/// Wrap in an `Arc` via [`FetchLimiter::new`], then call
/// [`FetchLimiter::acquire`] before each unit of work; the returned permit
/// must be held for the duration of the work.
#[derive(Debug)]
pub struct FetchLimiter {
    semaphore: Arc<Semaphore>,
}

impl FetchLimiter {
    /// Create a limiter allowing at most `max_concurrent` tasks at a time.
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    /// Acquire a concurrency slot, waiting if all slots are taken.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }
}
