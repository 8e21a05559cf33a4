//! Field transform stage
//!
//! Applies an ordered list of field-level steps to each record: rename,
//! remove, add, or filter on equality. A failed filter is an explicit
//! discard: the record leaves through the node's discard destinations,
//! not the normal path.

use crate::error::{Result, StageError, ValidationIssue};
use crate::registry::{parse_config, StageFactory};
use crate::traits::{Stage, StageOutput};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// One field-level transform step
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformStep {
    /// Move a field to a new key
    RenameField { from: String, to: String },
    /// Drop a field
    RemoveField { field: String },
    /// Insert or overwrite a field
    AddField {
        field: String,
        value: serde_json::Value,
    },
    /// Discard the record unless `field` equals `equals`
    Filter {
        field: String,
        equals: serde_json::Value,
    },
}

/// Field transform configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct FieldTransformConfig {
    /// Steps applied in order
    #[validate(length(min = 1))]
    pub steps: Vec<TransformStep>,
}

/// Stage applying ordered field-level transform steps
pub struct FieldTransformStage {
    steps: Vec<TransformStep>,
}

impl FieldTransformStage {
    /// Create a stage from its configuration
    pub fn new(config: FieldTransformConfig) -> Self {
        Self {
            steps: config.steps,
        }
    }
}

#[async_trait]
impl Stage for FieldTransformStage {
    async fn process(
        &self,
        record: &serde_json::Value,
    ) -> std::result::Result<StageOutput, StageError> {
        let mut value = record.clone();
        for step in &self.steps {
            match step {
                TransformStep::RenameField { from, to } => {
                    if let Some(obj) = value.as_object_mut() {
                        if let Some(v) = obj.remove(from) {
                            obj.insert(to.clone(), v);
                        }
                    }
                }
                TransformStep::RemoveField { field } => {
                    if let Some(obj) = value.as_object_mut() {
                        obj.remove(field);
                    }
                }
                TransformStep::AddField { field, value: v } => {
                    if let Some(obj) = value.as_object_mut() {
                        obj.insert(field.clone(), v.clone());
                    }
                }
                TransformStep::Filter { field, equals } => {
                    let matches = value.get(field).is_some_and(|v| v == equals);
                    if !matches {
                        return Ok(StageOutput::discard());
                    }
                }
            }
        }
        Ok(StageOutput::single(value))
    }

    fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        if self.steps.is_empty() {
            issues.push(ValidationIssue::new(
                "field-transform",
                "no transform steps configured",
            ));
        }
    }
}

/// Factory for creating [`FieldTransformStage`] instances
pub struct FieldTransformStageFactory;

impl StageFactory for FieldTransformStageFactory {
    fn create(&self, config: &serde_yaml::Value) -> Result<Arc<dyn Stage>> {
        let config: FieldTransformConfig = parse_config(config)?;
        Ok(Arc::new(FieldTransformStage::new(config)))
    }
}
