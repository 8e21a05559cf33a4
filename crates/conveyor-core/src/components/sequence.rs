//! Sequence source
//!
//! Emits a configured record list in fixed-size batches, then reports dry.
//! Useful for demos, smoke tests and reproducing routing scenarios without
//! an external system.

use crate::error::{Result, StageError, ValidationIssue};
use crate::registry::{parse_config, SourceFactory};
use crate::traits::Source;
use async_trait::async_trait;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Sequence source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct SequenceSourceConfig {
    /// Records to emit, in order
    #[serde(default)]
    pub records: Vec<serde_json::Value>,

    /// Records per batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Emit the record list this many times
    #[serde(default = "default_repeat")]
    #[validate(range(min = 1))]
    pub repeat: u32,
}

impl Default for SequenceSourceConfig {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            batch_size: default_batch_size(),
            repeat: default_repeat(),
        }
    }
}

fn default_batch_size() -> usize {
    1
}

fn default_repeat() -> u32 {
    1
}

/// Source emitting a scripted record sequence
pub struct SequenceSource {
    queue: Mutex<VecDeque<serde_json::Value>>,
    batch_size: usize,
}

impl SequenceSource {
    /// Create a source from its configuration
    pub fn new(config: SequenceSourceConfig) -> Self {
        let mut queue = VecDeque::with_capacity(config.records.len() * config.repeat as usize);
        for _ in 0..config.repeat {
            queue.extend(config.records.iter().cloned());
        }
        Self {
            queue: Mutex::new(queue),
            batch_size: config.batch_size,
        }
    }

    /// Create a source emitting each record in its own batch
    pub fn from_records(records: Vec<serde_json::Value>) -> Self {
        Self::new(SequenceSourceConfig {
            records,
            ..Default::default()
        })
    }

    /// Records not yet emitted
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl Source for SequenceSource {
    async fn next(&self, _timeout: Duration) -> std::result::Result<Vec<serde_json::Value>, StageError> {
        let mut queue = self.queue.lock();
        let take = self.batch_size.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    fn is_dry(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        if self.queue.lock().is_empty() {
            issues.push(ValidationIssue::new(
                "sequence",
                "no records configured; source is dry from the start",
            ));
        }
    }
}

/// Factory for creating [`SequenceSource`] instances
pub struct SequenceSourceFactory;

impl SourceFactory for SequenceSourceFactory {
    fn create(&self, config: &serde_yaml::Value) -> Result<Arc<dyn Source>> {
        let config: SequenceSourceConfig = parse_config(config)?;
        Ok(Arc::new(SequenceSource::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emits_in_batches() {
        let source = SequenceSource::new(SequenceSourceConfig {
            records: vec![json!(1), json!(2), json!(3), json!(4), json!(5)],
            batch_size: 2,
            repeat: 1,
        });

        assert_eq!(source.next(Duration::ZERO).await.unwrap().len(), 2);
        assert_eq!(source.next(Duration::ZERO).await.unwrap().len(), 2);
        assert_eq!(source.next(Duration::ZERO).await.unwrap().len(), 1);
        assert!(source.is_dry());
        assert!(source.next(Duration::ZERO).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_expands_records() {
        let source = SequenceSource::new(SequenceSourceConfig {
            records: vec![json!("x")],
            batch_size: 1,
            repeat: 3,
        });
        assert_eq!(source.remaining(), 3);
    }

    #[test]
    fn test_empty_source_flags_validation_issue() {
        let source = SequenceSource::from_records(vec![]);
        let mut issues = Vec::new();
        source.validate(&mut issues);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config: SequenceSourceConfig = serde_yaml::from_str("records: [1]").unwrap();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.repeat, 1);
    }
}
