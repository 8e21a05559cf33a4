//! Stage contract
//!
//! Stages are composable record processors that can modify, fan out, or
//! deliberately drop records in a graph.

use crate::error::{StageError, ValidationIssue};
use crate::traits::resource::TransactionalResource;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of processing one record
#[derive(Debug)]
pub enum StageOutput {
    /// Single record output (boxed to reduce enum size)
    Single(Box<serde_json::Value>),
    /// Multiple records output (fan-out); an empty list means no further
    /// action, which is distinct from a discard
    Multiple(Vec<serde_json::Value>),
    /// The record was deliberately filtered out; it is forwarded unchanged
    /// to the node's discard destinations
    Discard,
}

impl StageOutput {
    /// Create single record output
    pub fn single(record: serde_json::Value) -> Self {
        Self::Single(Box::new(record))
    }

    /// Create multiple records output
    pub fn multiple(records: Vec<serde_json::Value>) -> Self {
        Self::Multiple(records)
    }

    /// Create empty output (no further action)
    pub fn none() -> Self {
        Self::Multiple(Vec::new())
    }

    /// Create discard output (drop record via the discard path)
    pub fn discard() -> Self {
        Self::Discard
    }

    /// Convert to a vec of output records
    pub fn into_records(self) -> Vec<serde_json::Value> {
        match self {
            Self::Single(record) => vec![*record],
            Self::Multiple(records) => records,
            Self::Discard => Vec::new(),
        }
    }

    /// Check if the record was discarded
    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }

    /// Check if the output is a single record
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    /// Number of output records
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(records) => records.len(),
            Self::Discard => 0,
        }
    }

    /// Check if there are no output records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map over the output records
    pub fn map<F>(self, mut f: F) -> Self
    where
        F: FnMut(serde_json::Value) -> serde_json::Value,
    {
        match self {
            Self::Single(record) => Self::Single(Box::new(f(*record))),
            Self::Multiple(records) => Self::Multiple(records.into_iter().map(f).collect()),
            Self::Discard => Self::Discard,
        }
    }
}

/// Trait for record-processing stages
///
/// # Example
///
/// ```rust,ignore
/// use conveyor_core::prelude::*;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl Stage for Uppercase {
///     async fn process(&self, record: &serde_json::Value) -> Result<StageOutput, StageError> {
///         let text = record.as_str().ok_or_else(|| StageError::schema("expected a string"))?;
///         Ok(StageOutput::single(text.to_uppercase().into()))
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Process one record into zero or more records, or discard it, or fail
    async fn process(&self, record: &serde_json::Value) -> Result<StageOutput, StageError>;

    /// Called once before the first record
    async fn init(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Called once the run ends
    async fn shutdown(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Transactional resource owned by this stage, if any
    fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        None
    }

    /// Collect pre-run validation issues
    fn validate(&self, _issues: &mut Vec<ValidationIssue>) {}
}
