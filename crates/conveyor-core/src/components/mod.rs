//! Built-in utility components
//!
//! Small, dependency-free components for smoke-testing graphs and wiring
//! demos: a scripted source, a field-level transform stage, and a stdout
//! sink. Real connectors live in their own crates and plug in through the
//! same contracts.

pub mod sequence;
pub mod stdout;
pub mod transform;

pub use sequence::{SequenceSource, SequenceSourceConfig, SequenceSourceFactory};
pub use stdout::{StdoutSink, StdoutSinkConfig, StdoutSinkFactory};
pub use transform::{
    FieldTransformConfig, FieldTransformStage, FieldTransformStageFactory, TransformStep,
};
