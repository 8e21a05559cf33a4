//! Message envelope types
//!
//! A [`Message`] wraps one record on its way through the routing graph. The
//! payload is opaque to the engine; routing decisions never inspect it.

use crate::error::{ErrorKind, StageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope carrying one record through the graph
#[derive(Debug, Clone)]
pub struct Message {
    /// Record payload, opaque to the engine
    payload: serde_json::Value,
    /// Id of the node that produced the record
    sender: String,
    /// Creation time of the originating record
    timestamp: DateTime<Utc>,
    /// Free-form string metadata
    metadata: HashMap<String, String>,
    /// Ordered node ids this record descended through, when enabled
    history: Option<Vec<String>>,
}

impl Message {
    /// Create a new message from a freshly emitted record
    pub fn new(payload: serde_json::Value, sender: impl Into<String>) -> Self {
        Self {
            payload,
            sender: sender.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
            history: None,
        }
    }

    /// Enable history tracking (builder-style)
    ///
    /// History starts empty; each descent through a node appends that
    /// node's id, so a delivered record's history is exactly the ordered
    /// sequence of producers it passed through.
    pub fn with_history(mut self) -> Self {
        self.history.get_or_insert_with(Vec::new);
        self
    }

    /// Add a metadata entry (builder-style)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The record payload
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Consume the message, returning the payload
    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }

    /// Id of the producing node
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Creation time of the originating record
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Metadata map
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Mutable metadata map
    pub fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.metadata
    }

    /// Node ids this record descended through, if history is enabled
    pub fn history(&self) -> Option<&[String]> {
        self.history.as_deref()
    }

    /// Build the child message for a record descending through `via`.
    ///
    /// The child keeps the original sender, timestamp and metadata; when
    /// history is enabled the chain is extended with `via`.
    pub fn descend(&self, payload: serde_json::Value, via: &str) -> Message {
        let history = self.history.as_ref().map(|h| {
            let mut h = h.clone();
            h.push(via.to_string());
            h
        });
        Message {
            payload,
            sender: self.sender.clone(),
            timestamp: self.timestamp,
            metadata: self.metadata.clone(),
            history,
        }
    }
}

/// Payload written to error destinations when a stage failure is routed.
///
/// Wraps the failure kind and message together with the record that caused
/// it, so error sinks can persist or replay the original input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Taxonomy kind of the failure
    pub kind: ErrorKind,
    /// Failure message
    pub message: String,
    /// The record that triggered the failure
    pub record: serde_json::Value,
}

impl ErrorRecord {
    /// Wrap a stage failure and the offending record
    pub fn new(error: &StageError, record: serde_json::Value) -> Self {
        Self {
            kind: error.kind(),
            message: error.message().to_string(),
            record,
        }
    }

    /// The envelope as a JSON payload for dispatch
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "message": self.message,
            "record": self.record,
        })
    }

    /// Parse an envelope back out of a routed payload
    pub fn from_value(value: &serde_json::Value) -> Result<Self, StageError> {
        serde_json::from_value(value.clone()).map_err(StageError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_disabled_by_default() {
        let msg = Message::new(json!("x"), "in");
        assert!(msg.history().is_none());

        let child = msg.descend(json!("y"), "p");
        assert!(child.history().is_none());
        assert_eq!(child.sender(), "in");
    }

    #[test]
    fn test_history_extends_per_descent() {
        let msg = Message::new(json!("x"), "in").with_history();
        assert_eq!(msg.history(), Some(&[][..]));

        let child = msg.descend(json!("y"), "in");
        let grandchild = child.descend(json!("z"), "p");
        assert_eq!(
            grandchild.history(),
            Some(&["in".to_string(), "p".to_string()][..])
        );
        // the parent chain is untouched
        assert_eq!(child.history(), Some(&["in".to_string()][..]));
    }

    #[test]
    fn test_descend_keeps_sender_and_metadata() {
        let msg = Message::new(json!(1), "in").with_metadata("batch", "7");
        let child = msg.descend(json!(2), "p");

        assert_eq!(child.sender(), "in");
        assert_eq!(child.timestamp(), msg.timestamp());
        assert_eq!(child.metadata().get("batch"), Some(&"7".to_string()));
        assert_eq!(child.payload(), &json!(2));
    }

    #[test]
    fn test_error_record_round_trip() {
        let err = StageError::timeout("no response");
        let envelope = ErrorRecord::new(&err, json!({"id": 42}));
        let value = envelope.to_value();

        let parsed = ErrorRecord::from_value(&value).unwrap();
        assert_eq!(parsed.kind, ErrorKind::Timeout);
        assert_eq!(parsed.message, "no response");
        assert_eq!(parsed.record, json!({"id": 42}));
    }
}
