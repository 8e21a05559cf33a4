//! conveyor-core - routing and lifecycle engine for Conveyor
//!
//! Conveyor moves records between external systems through graphs of
//! pluggable sources, stages and sinks. This crate is the engine: it
//! decides, for every record a source emits, which downstream node(s)
//! receive it, where discarded records and routed failures go, how
//! transactional resources are committed together per batch, and how every
//! participant's run state is coordinated.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Adaptor (process owner)                 │
//! │   one poll-loop per Source ──▶ Router ──▶ RoutingMap walk       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Node = Source | Stage | Sink   +   Lifecycle state machine     │
//! │  edges: process · discard · error-kind bindings                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  TransactionalResource: identity-set commit per batch           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Building a graph
//!
//! ```rust,ignore
//! use conveyor_core::prelude::*;
//!
//! let adaptor = PipelineBuilder::new("orders")
//!     .source("reader", my_source)
//!     .stage("enrich", my_stage)
//!     .sink("writer", my_sink)
//!     .error_sink("errors", my_error_sink)
//!     .build()?;
//!
//! let summary = Arc::new(adaptor).run().await?;
//! std::process::exit(summary.exit_code());
//! ```
//!
//! Non-linear graphs go through [`routing::RoutingMap::builder`] directly;
//! config-driven graphs go through [`config::EngineConfig`] plus a
//! [`registry::ComponentRegistry`].

// Engine
pub mod adaptor;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod node;
pub mod pipeline;
pub mod router;
pub mod routing;

// Component contracts
pub mod traits;

// Configuration and component wiring
pub mod config;
pub mod registry;

// Built-in utility components
pub mod components;

// Mock components for tests
pub mod testing;

// Re-export core types at crate root for ergonomic use
pub use adaptor::{Adaptor, LoopEnd, LoopReport, RunSummary};
pub use config::{EngineConfig, EngineSettings};
pub use error::{
    ComponentResult, EngineError, ErrorKind, Result, RouteError, StageError, ValidationIssue,
};
pub use lifecycle::{Lifecycle, ListenerId, RunState, StateListener};
pub use message::{ErrorRecord, Message};
pub use node::{Node, SerialStage};
pub use pipeline::PipelineBuilder;
pub use registry::{ComponentRegistry, SinkFactory, SourceFactory, StageFactory};
pub use router::{BatchResult, DispatchOutcome, Router};
pub use routing::{RoutingMap, RoutingMapBuilder};
pub use traits::{
    DeliverResult, ResourceSet, Sink, Source, Stage, StageOutput, TransactionalResource,
};

/// Convenience imports for component authors
pub mod prelude {
    pub use crate::error::{
        ComponentResult, EngineError, ErrorKind, Result, StageError, ValidationIssue,
    };
    pub use crate::lifecycle::RunState;
    pub use crate::message::Message;
    pub use crate::node::Node;
    pub use crate::pipeline::PipelineBuilder;
    pub use crate::traits::{
        DeliverResult, Sink, Source, Stage, StageOutput, TransactionalResource,
    };
    pub use async_trait::async_trait;
}
