//! Sink contract

use crate::error::{StageError, ValidationIssue};
use crate::traits::resource::TransactionalResource;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of a delivery operation
#[derive(Debug, Clone, Default)]
pub struct DeliverResult {
    /// Number of records delivered
    pub records_delivered: u64,
    /// Number of bytes delivered
    pub bytes_delivered: u64,
    /// Number of records that failed
    pub records_failed: u64,
    /// Error messages for failed records
    pub errors: Vec<String>,
}

impl DeliverResult {
    /// Create a new delivery result
    pub fn new() -> Self {
        Self::default()
    }

    /// Add successfully delivered records
    pub fn add_success(&mut self, records: u64, bytes: u64) {
        self.records_delivered += records;
        self.bytes_delivered += bytes;
    }

    /// Add failed records
    pub fn add_failure(&mut self, records: u64, error: impl Into<String>) {
        self.records_failed += records;
        self.errors.push(error.into());
    }

    /// Check if there were any failures
    pub fn has_failures(&self) -> bool {
        self.records_failed > 0
    }
}

/// Trait for terminal sinks
///
/// Sinks consume record batches and write them to external systems. A sink
/// node is terminal in the graph: delivery there counts as accepted.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Establish the connection to the external system
    async fn connect(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Release the connection
    async fn disconnect(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Deliver a batch of records
    async fn deliver(&self, batch: Vec<serde_json::Value>) -> Result<DeliverResult, StageError>;

    /// Transactional resource owned by this sink, if any
    fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        None
    }

    /// Collect pre-run validation issues
    fn validate(&self, _issues: &mut Vec<ValidationIssue>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_result() {
        let mut result = DeliverResult::new();
        result.add_success(100, 1024);
        result.add_success(50, 512);

        assert_eq!(result.records_delivered, 150);
        assert_eq!(result.bytes_delivered, 1536);
        assert!(!result.has_failures());

        result.add_failure(5, "write timeout");
        assert!(result.has_failures());
        assert_eq!(result.records_failed, 5);
    }
}
