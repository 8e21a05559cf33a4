//! Component registry for config-driven graphs
//!
//! Factories create configured component instances from raw YAML values;
//! the registry maps component type names to factories. Users build their
//! own registry with exactly the components they need, or start from
//! [`ComponentRegistry::with_builtins`].
//!
//! # Example
//!
//! ```rust,ignore
//! use conveyor_core::registry::ComponentRegistry;
//! use std::sync::Arc;
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register_source("my-source", Arc::new(MySourceFactory));
//! ```

use crate::components::{FieldTransformStageFactory, SequenceSourceFactory, StdoutSinkFactory};
use crate::error::{EngineError, Result};
use crate::traits::{Sink, Source, Stage};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Factory creating configured source instances
pub trait SourceFactory: Send + Sync {
    /// Create a source from its raw YAML configuration
    fn create(&self, config: &serde_yaml::Value) -> Result<Arc<dyn Source>>;
}

/// Factory creating configured stage instances
pub trait StageFactory: Send + Sync {
    /// Create a stage from its raw YAML configuration
    fn create(&self, config: &serde_yaml::Value) -> Result<Arc<dyn Stage>>;
}

/// Factory creating configured sink instances
pub trait SinkFactory: Send + Sync {
    /// Create a sink from its raw YAML configuration
    fn create(&self, config: &serde_yaml::Value) -> Result<Arc<dyn Sink>>;
}

/// Parse and validate a typed component configuration out of raw YAML.
///
/// The shared entry point for factories: deserialization and `validator`
/// rules both surface as configuration errors.
pub fn parse_config<T>(value: &serde_yaml::Value) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let config: T = serde_yaml::from_value(value.clone())
        .map_err(|e| EngineError::config(format!("invalid component config: {e}")))?;
    config
        .validate()
        .map_err(|e| EngineError::config(format!("component config validation failed: {e}")))?;
    Ok(config)
}

/// Registry of available component types
#[derive(Default)]
pub struct ComponentRegistry {
    sources: HashMap<String, Arc<dyn SourceFactory>>,
    stages: HashMap<String, Arc<dyn StageFactory>>,
    sinks: HashMap<String, Arc<dyn SinkFactory>>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in utility components registered
    /// ("sequence", "field-transform", "stdout")
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_source("sequence", Arc::new(SequenceSourceFactory));
        registry.register_stage("field-transform", Arc::new(FieldTransformStageFactory));
        registry.register_sink("stdout", Arc::new(StdoutSinkFactory));
        registry
    }

    /// Register a source factory
    pub fn register_source(&mut self, name: &str, factory: Arc<dyn SourceFactory>) {
        self.sources.insert(name.to_string(), factory);
    }

    /// Register a stage factory
    pub fn register_stage(&mut self, name: &str, factory: Arc<dyn StageFactory>) {
        self.stages.insert(name.to_string(), factory);
    }

    /// Register a sink factory
    pub fn register_sink(&mut self, name: &str, factory: Arc<dyn SinkFactory>) {
        self.sinks.insert(name.to_string(), factory);
    }

    /// Get a source factory by component type name
    pub fn source(&self, name: &str) -> Option<&Arc<dyn SourceFactory>> {
        self.sources.get(name)
    }

    /// Get a stage factory by component type name
    pub fn stage(&self, name: &str) -> Option<&Arc<dyn StageFactory>> {
        self.stages.get(name)
    }

    /// Get a sink factory by component type name
    pub fn sink(&self, name: &str) -> Option<&Arc<dyn SinkFactory>> {
        self.sinks.get(name)
    }

    /// Sorted list of registered source types
    pub fn list_sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted list of registered stage types
    pub fn list_stages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted list of registered sink types
    pub fn list_sinks(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sinks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
