//! Source contract
//!
//! Sources read data from external systems and emit record batches into the
//! graph. The adaptor drives one poll-loop per source: `next` until the
//! source reports `is_dry`, dispatching each returned batch.

use crate::error::{StageError, ValidationIssue};
use crate::traits::resource::TransactionalResource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for record sources
///
/// Implementations use interior mutability; the engine shares sources as
/// `Arc<dyn Source>` and never takes `&mut self`.
///
/// # Example
///
/// ```rust,ignore
/// use conveyor_core::prelude::*;
///
/// struct LineSource { lines: parking_lot::Mutex<Vec<serde_json::Value>> }
///
/// #[async_trait]
/// impl Source for LineSource {
///     async fn next(&self, _timeout: Duration) -> Result<Vec<serde_json::Value>, StageError> {
///         Ok(self.lines.lock().drain(..).collect())
///     }
///
///     fn is_dry(&self) -> bool {
///         self.lines.lock().is_empty()
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Establish the connection to the external system.
    ///
    /// A connect failure is fatal to this source's poll-loop; the engine
    /// does not retry.
    async fn connect(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Release the connection. Called once the poll-loop ends.
    async fn disconnect(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Poll for the next batch of records.
    ///
    /// An empty batch means the timeout elapsed with nothing available,
    /// not exhaustion. Exhaustion is reported through [`Source::is_dry`].
    async fn next(&self, timeout: Duration) -> Result<Vec<serde_json::Value>, StageError>;

    /// Whether this source is permanently exhausted
    fn is_dry(&self) -> bool;

    /// Transactional resource owned by this source, if any.
    ///
    /// The engine only tracks identity membership for commit batching; the
    /// resource stays exclusively owned by its connector.
    fn resource(&self) -> Option<Arc<dyn TransactionalResource>> {
        None
    }

    /// Collect pre-run validation issues. Push findings instead of failing;
    /// the adaptor reports every issue across the graph together.
    fn validate(&self, _issues: &mut Vec<ValidationIssue>) {}
}
