//! Testing utilities
//!
//! Mock components for exercising graphs without external systems. These
//! back the engine's own tests and are public so component authors can test
//! against the same contracts.
//!
//! # Example
//!
//! ```rust,ignore
//! use conveyor_core::testing::*;
//!
//! #[tokio::test]
//! async fn test_my_graph() {
//!     let src = Node::source("in", Arc::new(MockSource::with_records(vec![json!("x")])));
//!     let sink = Arc::new(RecordingSink::new());
//!     let out = Node::sink("out", sink.clone());
//!     // wire a map, run a router, assert on sink.records()
//! }
//! ```

use crate::error::StageError;
use crate::traits::{DeliverResult, Sink, Source, Stage, StageOutput, TransactionalResource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A source emitting a scripted sequence of batches
pub struct MockSource {
    batches: Mutex<VecDeque<Vec<serde_json::Value>>>,
    poll_error: Mutex<Option<StageError>>,
    connect_error: Mutex<Option<StageError>>,
    resource: Option<Arc<dyn TransactionalResource>>,
}

impl MockSource {
    /// Create a source with nothing to emit
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            poll_error: Mutex::new(None),
            connect_error: Mutex::new(None),
            resource: None,
        }
    }

    /// Create a source emitting one batch containing `records`
    pub fn with_records(records: Vec<serde_json::Value>) -> Self {
        Self::with_batches(vec![records])
    }

    /// Create a source emitting the given batches in order
    pub fn with_batches(batches: Vec<Vec<serde_json::Value>>) -> Self {
        let source = Self::new();
        *source.batches.lock() = batches.into();
        source
    }

    /// Fail the poll after the scripted batches are drained (builder-style)
    pub fn then_fail(self, error: StageError) -> Self {
        *self.poll_error.lock() = Some(error);
        self
    }

    /// Fail `connect` with the given error (builder-style)
    pub fn fail_connect_with(self, error: StageError) -> Self {
        *self.connect_error.lock() = Some(error);
        self
    }

    /// Expose a transactional resource (builder-style)
    pub fn with_resource(mut self, resource: Arc<dyn TransactionalResource>) -> Self {
        self.resource = Some(resource);
        self
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MockSource {
    async fn connect(&self) -> Result<(), StageError> {
        match self.connect_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn next(&self, _timeout: Duration) -> Result<Vec<serde_json::Value>, StageError> {
        if let Some(batch) = self.batches.lock().pop_front() {
            return Ok(batch);
        }
        match self.poll_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(Vec::new()),
        }
    }

    fn is_dry(&self) -> bool {
        self.batches.lock().is_empty() && self.poll_error.lock().is_none()
    }

    fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        self.resource.clone()
    }
}

/// A stage driven by a closure
pub struct MockStage {
    f: Box<dyn Fn(&serde_json::Value) -> Result<StageOutput, StageError> + Send + Sync>,
}

impl MockStage {
    /// Create a stage from a processing closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<StageOutput, StageError> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl Stage for MockStage {
    async fn process(&self, record: &serde_json::Value) -> Result<StageOutput, StageError> {
        (self.f)(record)
    }
}

/// A stage wrapper that fails every Nth call, delegating otherwise
pub struct FailingStage {
    inner: Arc<dyn Stage>,
    every_nth: u64,
    calls: AtomicU64,
    error: StageError,
}

impl FailingStage {
    /// Fail every `every_nth` call with a processing error
    pub fn every(every_nth: u64, inner: Arc<dyn Stage>) -> Self {
        Self {
            inner,
            every_nth: every_nth.max(1),
            calls: AtomicU64::new(0),
            error: StageError::processing("synthetic failure"),
        }
    }

    /// Use a specific error template (builder-style)
    pub fn with_error(mut self, error: StageError) -> Self {
        self.error = error;
        self
    }

    /// Number of calls observed so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    async fn process(&self, record: &serde_json::Value) -> Result<StageOutput, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % self.every_nth == 0 {
            return Err(self.error.clone());
        }
        self.inner.process(record).await
    }
}

/// A sink capturing everything delivered to it.
///
/// Clones share the same buffer, so a handle kept by the test observes the
/// deliveries made through the graph's copy.
#[derive(Clone)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<serde_json::Value>>>,
    deliver_error: Arc<Mutex<Option<StageError>>>,
    resource: Option<Arc<dyn TransactionalResource>>,
}

impl RecordingSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            deliver_error: Arc::new(Mutex::new(None)),
            resource: None,
        }
    }

    /// Fail every delivery with the given error (builder-style)
    pub fn fail_with(self, error: StageError) -> Self {
        *self.deliver_error.lock() = Some(error);
        self
    }

    /// Expose a transactional resource (builder-style)
    pub fn with_resource(mut self, resource: Arc<dyn TransactionalResource>) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Snapshot of the captured records
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.records.lock().clone()
    }

    /// Number of captured records
    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, batch: Vec<serde_json::Value>) -> Result<DeliverResult, StageError> {
        if let Some(error) = self.deliver_error.lock().clone() {
            return Err(error);
        }
        let mut result = DeliverResult::new();
        result.add_success(batch.len() as u64, 0);
        self.records.lock().extend(batch);
        Ok(result)
    }

    fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        self.resource.clone()
    }
}

/// A transactional resource counting commits and rollbacks
pub struct MockResource {
    commits: AtomicU64,
    rollbacks: AtomicU64,
    fail_commit: bool,
}

impl MockResource {
    /// Create a resource that accepts every commit
    pub fn new() -> Self {
        Self {
            commits: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            fail_commit: false,
        }
    }

    /// Make every commit fail (builder-style)
    pub fn failing() -> Self {
        Self {
            fail_commit: true,
            ..Self::new()
        }
    }

    /// Number of commits observed
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of rollbacks observed
    pub fn rollback_count(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

impl Default for MockResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionalResource for MockResource {
    async fn commit(&self) -> Result<(), StageError> {
        if self.fail_commit {
            return Err(StageError::resource("commit refused"));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StageError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
