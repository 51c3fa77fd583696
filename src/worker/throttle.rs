//! # Reserved Concurrency
//!
//! Worker-side admission limit, independent of the orchestrator's own cap.
//! An invocation that arrives while every reserved slot is taken is rejected
//! immediately with [`ErrorKind::ThrottlingException`] instead of queueing,
//! which lets the orchestrator's retry policy absorb the overload.

use super::traits::{BatchWorker, ErrorKind, WorkerError};
use crate::orchestration::types::Batch;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Wraps a worker and enforces a reserved-concurrency limit on it
pub struct ReservedConcurrencyWorker<W> {
    inner: W,
    reserved: usize,
    slots: Arc<Semaphore>,
    throttled: AtomicU64,
}

impl<W: BatchWorker> ReservedConcurrencyWorker<W> {
    pub fn new(inner: W, reserved_concurrency: usize) -> Self {
        Self {
            inner,
            reserved: reserved_concurrency,
            slots: Arc::new(Semaphore::new(reserved_concurrency)),
            throttled: AtomicU64::new(0),
        }
    }

    pub fn reserved_concurrency(&self) -> usize {
        self.reserved
    }

    /// Number of invocations rejected so far
    pub fn throttled_count(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

#[async_trait]
impl<W: BatchWorker> BatchWorker for ReservedConcurrencyWorker<W> {
    async fn invoke(&self, batch: &Batch) -> Result<Value, WorkerError> {
        let Ok(_permit) = self.slots.try_acquire() else {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            debug!(
                worker = self.inner.worker_name(),
                batch_index = batch.index(),
                reserved = self.reserved,
                "Invocation throttled"
            );
            return Err(WorkerError::new(
                ErrorKind::ThrottlingException,
                format!(
                    "{} is at its reserved concurrency of {}",
                    self.inner.worker_name(),
                    self.reserved
                ),
            ));
        };

        self.inner.invoke(batch).await
    }

    fn worker_name(&self) -> &str {
        self.inner.worker_name()
    }
}
