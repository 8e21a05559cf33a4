//! Stdout sink
//!
//! Writes records to stdout as JSON lines, for debugging and demos.

use crate::error::{Result, StageError};
use crate::registry::{parse_config, SinkFactory};
use crate::traits::{DeliverResult, Sink};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Stdout sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, JsonSchema)]
pub struct StdoutSinkConfig {
    /// Pretty-print each record instead of one line per record
    #[serde(default)]
    pub pretty: bool,
}

/// Sink writing records to stdout
pub struct StdoutSink {
    pretty: bool,
}

impl StdoutSink {
    /// Create a sink from its configuration
    pub fn new(config: StdoutSinkConfig) -> Self {
        Self {
            pretty: config.pretty,
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new(StdoutSinkConfig::default())
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn deliver(
        &self,
        batch: Vec<serde_json::Value>,
    ) -> std::result::Result<DeliverResult, StageError> {
        let mut result = DeliverResult::new();
        for record in &batch {
            let line = if self.pretty {
                serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string())
            } else {
                record.to_string()
            };
            println!("{}", line);
            result.add_success(1, line.len() as u64);
        }
        Ok(result)
    }
}

/// Factory for creating [`StdoutSink`] instances
pub struct StdoutSinkFactory;

impl SinkFactory for StdoutSinkFactory {
    fn create(&self, config: &serde_yaml::Value) -> Result<Arc<dyn Sink>> {
        let config: StdoutSinkConfig = parse_config(config)?;
        Ok(Arc::new(StdoutSink::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config: StdoutSinkConfig = serde_yaml::from_str("{}").unwrap();
        assert!(!config.pretty);
    }

    #[tokio::test]
    async fn test_deliver_counts_records() {
        let sink = StdoutSink::default();
        let result = sink.deliver(vec![json!({"id": 1}), json!({"id": 2})]).await.unwrap();
        assert_eq!(result.records_delivered, 2);
        assert!(result.bytes_delivered > 0);
        assert!(!result.has_failures());
    }
}
