//! Graph participants
//!
//! A [`Node`] adapts one component (source, stage, or sink) into a uniform
//! graph participant with an id and a [`Lifecycle`]. Nodes are built through
//! the explicit factory constructors before graph insertion; nothing is
//! wrapped implicitly at dispatch time.

use crate::error::{ErrorKind, StageError, ValidationIssue};
use crate::lifecycle::Lifecycle;
use crate::traits::{Sink, Source, Stage, StageOutput, TransactionalResource};
use async_trait::async_trait;
use std::sync::Arc;

enum NodeKind {
    Source(Arc<dyn Source>),
    Stage(Arc<dyn Stage>),
    Sink(Arc<dyn Sink>),
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Stage(_) => "stage",
            Self::Sink(_) => "sink",
        }
    }
}

/// A wrapped source/stage/sink participating in the routing graph
pub struct Node {
    id: String,
    kind: NodeKind,
    lifecycle: Lifecycle,
}

impl Node {
    /// Wrap a source into a graph entry node
    pub fn source(id: impl Into<String>, source: Arc<dyn Source>) -> Arc<Node> {
        Arc::new(Node {
            id: id.into(),
            kind: NodeKind::Source(source),
            lifecycle: Lifecycle::new(),
        })
    }

    /// Wrap a stage into a graph node
    pub fn stage(id: impl Into<String>, stage: Arc<dyn Stage>) -> Arc<Node> {
        Arc::new(Node {
            id: id.into(),
            kind: NodeKind::Stage(stage),
            lifecycle: Lifecycle::new(),
        })
    }

    /// Wrap a sink into a terminal graph node
    pub fn sink(id: impl Into<String>, sink: Arc<dyn Sink>) -> Arc<Node> {
        Arc::new(Node {
            id: id.into(),
            kind: NodeKind::Sink(sink),
            lifecycle: Lifecycle::new(),
        })
    }

    /// Node id, unique within a routing map
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The node's run-state machine
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Whether this node wraps a source
    pub fn is_source(&self) -> bool {
        matches!(self.kind, NodeKind::Source(_))
    }

    /// The wrapped source, if this is an entry node
    pub fn as_source(&self) -> Option<&Arc<dyn Source>> {
        match &self.kind {
            NodeKind::Source(source) => Some(source),
            _ => None,
        }
    }

    /// Capability label for logging ("source" / "stage" / "sink")
    pub fn kind_label(&self) -> &'static str {
        self.kind.label()
    }

    /// Run one record through the wrapped component.
    ///
    /// A source node passes the record through unchanged; this is the
    /// entry dispatch for records the source itself emitted. A sink node
    /// delivers the record and yields no outputs; the delivery is terminal.
    pub async fn process(&self, record: &serde_json::Value) -> Result<StageOutput, StageError> {
        match &self.kind {
            NodeKind::Source(_) => Ok(StageOutput::single(record.clone())),
            NodeKind::Stage(stage) => stage.process(record).await,
            NodeKind::Sink(sink) => {
                let result = sink.deliver(vec![record.clone()]).await?;
                if result.has_failures() {
                    return Err(StageError::new(
                        ErrorKind::Processing,
                        format!("sink '{}' rejected record: {}", self.id, result.errors.join("; ")),
                    ));
                }
                Ok(StageOutput::none())
            }
        }
    }

    /// Open the wrapped component (connect / init)
    pub async fn open(&self) -> Result<(), StageError> {
        match &self.kind {
            NodeKind::Source(source) => source.connect().await,
            NodeKind::Stage(stage) => stage.init().await,
            NodeKind::Sink(sink) => sink.connect().await,
        }
    }

    /// Close the wrapped component (disconnect / shutdown)
    pub async fn close(&self) -> Result<(), StageError> {
        match &self.kind {
            NodeKind::Source(source) => source.disconnect().await,
            NodeKind::Stage(stage) => stage.shutdown().await,
            NodeKind::Sink(sink) => sink.disconnect().await,
        }
    }

    /// Transactional resource exposed by the wrapped component, if any
    pub fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        match &self.kind {
            NodeKind::Source(source) => source.resource(),
            NodeKind::Stage(stage) => stage.resource(),
            NodeKind::Sink(sink) => sink.resource(),
        }
    }

    /// Collect the wrapped component's pre-run validation issues
    pub fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        match &self.kind {
            NodeKind::Source(source) => source.validate(issues),
            NodeKind::Stage(stage) => stage.validate(issues),
            NodeKind::Sink(sink) => sink.validate(issues),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind.label())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

/// Serializing wrapper for stages that are not safe for concurrent entry.
///
/// The engine imposes no implicit serialization on shared downstream
/// stages; a stage entered by multiple source loops must opt in by being
/// wrapped here. The wrapper acquires a per-stage async mutex around each
/// `process` invocation.
pub struct SerialStage {
    inner: Arc<dyn Stage>,
    gate: tokio::sync::Mutex<()>,
}

impl SerialStage {
    /// Wrap a stage so it is entered by one task at a time
    pub fn new(inner: Arc<dyn Stage>) -> Self {
        Self {
            inner,
            gate: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl Stage for SerialStage {
    async fn process(&self, record: &serde_json::Value) -> Result<StageOutput, StageError> {
        let _entered = self.gate.lock().await;
        self.inner.process(record).await
    }

    async fn init(&self) -> Result<(), StageError> {
        self.inner.init().await
    }

    async fn shutdown(&self) -> Result<(), StageError> {
        self.inner.shutdown().await
    }

    fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        self.inner.resource()
    }

    fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        self.inner.validate(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockStage, RecordingSink};
    use serde_json::json;

    #[tokio::test]
    async fn test_source_node_passes_record_through() {
        let source = crate::testing::MockSource::with_records(vec![json!("a")]);
        let node = Node::source("in", Arc::new(source));

        let output = node.process(&json!("a")).await.unwrap();
        assert_eq!(output.into_records(), vec![json!("a")]);
    }

    #[tokio::test]
    async fn test_sink_node_is_terminal() {
        let sink = Arc::new(RecordingSink::new());
        let node = Node::sink("out", sink.clone());

        let output = node.process(&json!({"id": 1})).await.unwrap();
        assert!(output.is_empty());
        assert!(!output.is_discard());
        assert_eq!(sink.records(), vec![json!({"id": 1})]);
    }

    #[tokio::test]
    async fn test_stage_node_delegates() {
        let stage = MockStage::new(|record| {
            Ok(StageOutput::single(json!(format!(
                "p({})",
                record.as_str().unwrap_or_default()
            ))))
        });
        let node = Node::stage("p", Arc::new(stage));

        let output = node.process(&json!("x")).await.unwrap();
        assert_eq!(output.into_records(), vec![json!("p(x)")]);
    }

    #[tokio::test]
    async fn test_serial_stage_delegates() {
        let stage = Arc::new(MockStage::new(|record| {
            Ok(StageOutput::single(record.clone()))
        }));
        let serial = SerialStage::new(stage);

        let output = serial.process(&json!(7)).await.unwrap();
        assert_eq!(output.into_records(), vec![json!(7)]);
    }
}
