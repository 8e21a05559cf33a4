//! Record dispatch engine
//!
//! The [`Router`] walks a [`RoutingMap`] to deliver every record a source
//! emits: normal outputs fan out to the node's process destinations,
//! discards follow the discard edges, failures resolve through the
//! error-kind bindings, and anything unresolvable propagates out as
//! [`RouteError::Unrouted`]. Across one batch the router accumulates the
//! identity-distinct set of transactional resources touched and commits
//! each exactly once when the whole batch completes.

use crate::error::RouteError;
use crate::message::{ErrorRecord, Message};
use crate::node::Node;
use crate::routing::RoutingMap;
use crate::traits::ResourceSet;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Delivery counters for one dispatch or batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Terminal-sink arrivals
    pub sink_arrivals: u64,
    /// Records a node deliberately discarded
    pub discarded: u64,
    /// Failures resolved to at least one error destination
    pub errors_routed: u64,
}

impl DispatchOutcome {
    /// Fold another outcome into this one
    pub fn absorb(&mut self, other: DispatchOutcome) {
        self.sink_arrivals += other.sink_arrivals;
        self.discarded += other.discarded;
        self.errors_routed += other.errors_routed;
    }
}

/// Result of routing one batch to completion
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchResult {
    /// Records the batch contained
    pub records_in: u64,
    /// Delivery counters across every branch
    pub outcome: DispatchOutcome,
    /// Distinct transactional resources committed for this batch
    pub resources_committed: usize,
}

/// Dispatch engine over one routing map.
///
/// A router may be entered concurrently by multiple source loops; it keeps
/// no per-record state of its own and imposes no serialization on shared
/// downstream stages (see [`crate::node::SerialStage`]).
pub struct Router {
    map: Arc<RoutingMap>,
    history: bool,
}

impl Router {
    /// Create a router over a routing map
    pub fn new(map: Arc<RoutingMap>) -> Self {
        Self {
            map,
            history: false,
        }
    }

    /// Enable or disable message history tracking (builder-style)
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.history = enabled;
        self
    }

    /// The routing map this router dispatches over
    pub fn map(&self) -> &Arc<RoutingMap> {
        &self.map
    }

    /// Route one batch from `origin` to completion.
    ///
    /// One poll from one source is the transactional cycle: if every record
    /// of the batch completes with no unrouted failure, every distinct
    /// resource touched while propagating the batch (including discard and
    /// error branches) is committed exactly once, in first-touched order.
    /// If an unrouted failure propagates, nothing is committed and the
    /// error surfaces to the caller.
    pub async fn process_batch(
        &self,
        batch: Vec<serde_json::Value>,
        origin: &Arc<Node>,
    ) -> Result<BatchResult, RouteError> {
        let records_in = batch.len() as u64;
        let mut txn = ResourceSet::new();
        let mut outcome = DispatchOutcome::default();

        for payload in batch {
            let mut message = Message::new(payload, origin.id());
            if self.history {
                message = message.with_history();
            }
            self.dispatch(message, origin.clone(), &mut txn, &mut outcome)
                .await?;
        }

        let resources_committed = txn
            .commit_all()
            .await
            .map_err(|e| RouteError::Commit(e.to_string()))?;
        debug!(
            origin = origin.id(),
            records_in,
            sink_arrivals = outcome.sink_arrivals,
            discarded = outcome.discarded,
            errors_routed = outcome.errors_routed,
            resources_committed,
            "batch routed"
        );
        Ok(BatchResult {
            records_in,
            outcome,
            resources_committed,
        })
    }

    /// Route a single message from `node` to completion, as a one-record
    /// cycle with its own commit.
    pub async fn process(
        &self,
        message: Message,
        node: &Arc<Node>,
    ) -> Result<DispatchOutcome, RouteError> {
        let mut txn = ResourceSet::new();
        let mut outcome = DispatchOutcome::default();
        self.dispatch(message, node.clone(), &mut txn, &mut outcome)
            .await?;
        txn.commit_all()
            .await
            .map_err(|e| RouteError::Commit(e.to_string()))?;
        Ok(outcome)
    }

    /// Recursive dispatch of one message at one node.
    ///
    /// Traversal is an unbounded-depth call chain on the dispatching task;
    /// only the components themselves may suspend.
    fn dispatch<'a>(
        &'a self,
        message: Message,
        node: Arc<Node>,
        txn: &'a mut ResourceSet,
        outcome: &'a mut DispatchOutcome,
    ) -> BoxFuture<'a, Result<(), RouteError>> {
        async move {
            if let Some(resource) = node.resource() {
                txn.insert(resource);
            }

            match node.process(message.payload()).await {
                Ok(output) if output.is_discard() => {
                    outcome.discarded += 1;
                    trace!(node = node.id(), "record discarded");
                    let destinations = self.map.discard_destinations(node.id());
                    for destination in destinations {
                        let forwarded = message.descend(message.payload().clone(), node.id());
                        self.dispatch(forwarded, destination.clone(), &mut *txn, &mut *outcome)
                            .await?;
                    }
                    Ok(())
                }
                Ok(output) => {
                    let destinations = self.map.process_destinations(node.id());
                    if destinations.is_empty() {
                        // terminal: delivery here counts as accepted
                        outcome.sink_arrivals += 1;
                        trace!(
                            node = node.id(),
                            history = ?message.history(),
                            "record reached terminal sink"
                        );
                        return Ok(());
                    }
                    // strict fan-out: each output record goes to each
                    // destination exactly once
                    for record in output.into_records() {
                        for destination in destinations {
                            let child = message.descend(record.clone(), node.id());
                            self.dispatch(child, destination.clone(), &mut *txn, &mut *outcome)
                                .await?;
                        }
                    }
                    Ok(())
                }
                Err(error) => {
                    let destinations = self.map.error_destinations(node.id(), error.kind());
                    if destinations.is_empty() {
                        return Err(RouteError::Unrouted {
                            node: node.id().to_string(),
                            source: error,
                        });
                    }
                    outcome.errors_routed += 1;
                    warn!(
                        node = node.id(),
                        kind = %error.kind(),
                        destinations = destinations.len(),
                        "routing failed record to error destinations"
                    );
                    let envelope = ErrorRecord::new(&error, message.payload().clone()).to_value();
                    for destination in &destinations {
                        let child = message.descend(envelope.clone(), node.id());
                        self.dispatch(child, destination.clone(), &mut *txn, &mut *outcome)
                            .await?;
                    }
                    Ok(())
                }
            }
        }
        .boxed()
    }
}
