//! MetricSource implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use guildpulse_events::{EventStore, QuerySpec, RawRow, StoreError};
use tokio_util::sync::CancellationToken;

/// Executes built queries. The dispatcher's only view of storage.
///
/// Implemented by `EventStore` (postgres) and `MemoryMetricSource` (tests).
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn execute(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRow>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// EventStore adapter (postgres)
// ---------------------------------------------------------------------------

#[async_trait]
impl MetricSource for EventStore {
    async fn execute(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRow>, StoreError> {
        EventStore::execute(self, spec, cancel).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        EventStore::ping(self).await
    }
}

// ---------------------------------------------------------------------------
// MemoryMetricSource (tests, no database required)
// ---------------------------------------------------------------------------

/// In-memory source for testing. Returns queued outcomes first, then the
/// fallback rows. Records every spec it is asked to run. Thread-safe.
pub struct MemoryMetricSource {
    calls: AtomicUsize,
    executed: Mutex<Vec<QuerySpec>>,
    queued: Mutex<VecDeque<Result<Vec<RawRow>, StoreError>>>,
    fallback: Mutex<Vec<RawRow>>,
    hang: AtomicBool,
    healthy: AtomicBool,
}

impl MemoryMetricSource {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Vec::new()),
            hang: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
        }
    }

    /// Answer every query with `rows` once the queue is drained.
    pub fn with_rows(rows: Vec<RawRow>) -> Self {
        let source = Self::new();
        *source.fallback.lock().unwrap_or_else(|e| e.into_inner()) = rows;
        source
    }

    /// Queue an outcome for the next unanswered call.
    pub fn push(&self, outcome: Result<Vec<RawRow>, StoreError>) {
        self.queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    /// Make every call block until its cancellation token fires.
    pub fn hang_until_cancelled(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `execute` calls that reached this source.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every spec executed so far, in call order.
    pub fn executed(&self) -> Vec<QuerySpec> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MemoryMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for MemoryMetricSource {
    async fn execute(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRow>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());

        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.hang.load(Ordering::SeqCst) {
            cancel.cancelled().await;
            return Err(StoreError::Cancelled);
        }

        let queued = self
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match queued {
            Some(outcome) => outcome,
            None => Ok(self.fallback.lock().unwrap_or_else(|e| e.into_inner()).clone()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory source marked unhealthy".to_string()))
        }
    }
}
