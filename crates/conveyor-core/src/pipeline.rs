//! Linear pipelines
//!
//! A pipeline is the linear specialization of the routing graph: one
//! source, an ordered stage chain, one sink, and optionally one shared
//! error sink bound with a wildcard at every node. The builder accepts
//! bare components and wraps them into uniform [`Node`]s at build time,
//! the explicit factory step; nothing is wrapped at dispatch time.
//!
//! # Example
//!
//! ```rust,ignore
//! use conveyor_core::pipeline::PipelineBuilder;
//!
//! let adaptor = PipelineBuilder::new("orders")
//!     .source("reader", my_source)
//!     .stage("enrich", my_stage)
//!     .sink("writer", my_sink)
//!     .error_sink("errors", my_error_sink)
//!     .build()?;
//! let summary = Arc::new(adaptor).run().await?;
//! ```

use crate::adaptor::Adaptor;
use crate::config::EngineSettings;
use crate::error::{EngineError, ErrorKind, Result};
use crate::node::Node;
use crate::routing::RoutingMap;
use crate::traits::{Sink, Source, Stage};
use std::sync::Arc;

/// Builder for linear pipelines
pub struct PipelineBuilder {
    name: String,
    settings: EngineSettings,
    source: Option<Arc<Node>>,
    stages: Vec<Arc<Node>>,
    sink: Option<Arc<Node>>,
    error_sink: Option<Arc<Node>>,
}

impl PipelineBuilder {
    /// Start a pipeline with deterministic (sequential) settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: EngineSettings {
                concurrent: false,
                ..Default::default()
            },
            source: None,
            stages: Vec::new(),
            sink: None,
            error_sink: None,
        }
    }

    /// Override the engine settings
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the pipeline's source
    pub fn source(mut self, id: impl Into<String>, source: impl Source + 'static) -> Self {
        self.source = Some(Node::source(id, Arc::new(source)));
        self
    }

    /// Append a stage to the chain
    pub fn stage(mut self, id: impl Into<String>, stage: impl Stage + 'static) -> Self {
        self.stages.push(Node::stage(id, Arc::new(stage)));
        self
    }

    /// Set the pipeline's terminal sink
    pub fn sink(mut self, id: impl Into<String>, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Node::sink(id, Arc::new(sink)));
        self
    }

    /// Bind a shared error sink with a wildcard match at every node
    pub fn error_sink(mut self, id: impl Into<String>, sink: impl Sink + 'static) -> Self {
        self.error_sink = Some(Node::sink(id, Arc::new(sink)));
        self
    }

    /// Wire the chain into a routing map and produce the adaptor
    pub fn build(self) -> Result<Adaptor> {
        let source = self
            .source
            .ok_or_else(|| EngineError::config("pipeline requires a source"))?;
        let sink = self
            .sink
            .ok_or_else(|| EngineError::config("pipeline requires a sink"))?;

        let mut chain = Vec::with_capacity(self.stages.len() + 2);
        chain.push(source);
        chain.extend(self.stages);
        chain.push(sink);

        let mut builder = RoutingMap::builder();
        for pair in chain.windows(2) {
            builder = builder.route(&pair[0], &[pair[1].clone()]);
        }
        if let Some(error_sink) = &self.error_sink {
            for node in &chain {
                builder = builder.route_error(node, ErrorKind::Any, &[error_sink.clone()]);
            }
        }

        Ok(Adaptor::new(self.name, builder.build(), self.settings))
    }
}
