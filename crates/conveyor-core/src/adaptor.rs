//! Adaptor: the process owner
//!
//! An [`Adaptor`] owns one routing map and drives one poll-loop per source
//! into the router: `next(poll_timeout)` until the source reports dry or an
//! unrouted failure escapes, dispatching each returned batch. Loops run one
//! task per source by default, or sequentially on the calling task for
//! deterministic runs. The run summary aggregates per-loop outcomes into
//! the process exit contract: 0 iff every loop ended by exhaustion or a
//! requested stop.

use crate::config::EngineSettings;
use crate::error::{EngineError, Result};
use crate::lifecycle::{Lifecycle, RunState};
use crate::node::Node;
use crate::router::{DispatchOutcome, Router};
use crate::routing::RoutingMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a source loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The source reported permanent exhaustion
    Exhausted,
    /// A requested stop was observed at the top of an iteration
    Stopped,
}

/// Outcome of one source poll-loop
#[derive(Debug)]
pub struct LoopReport {
    /// Source node id
    pub node: String,
    /// Records read from the source
    pub records_in: u64,
    /// Delivery counters across every dispatched batch
    pub outcome: DispatchOutcome,
    /// Clean end, or the error that killed the loop
    pub result: std::result::Result<LoopEnd, EngineError>,
}

impl LoopReport {
    /// Whether the loop ended without an error
    pub fn is_clean(&self) -> bool {
        self.result.is_ok()
    }

    fn failed(node: &str, error: EngineError) -> Self {
        Self {
            node: node.to_string(),
            records_in: 0,
            outcome: DispatchOutcome::default(),
            result: Err(error),
        }
    }
}

/// Aggregated outcome of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One report per source loop
    pub loops: Vec<LoopReport>,
}

impl RunSummary {
    /// Whether every source loop ended cleanly
    pub fn is_clean(&self) -> bool {
        self.loops.iter().all(LoopReport::is_clean)
    }

    /// Process exit code: 0 iff every loop ended by exhaustion or a
    /// requested stop, non-zero otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }

    /// Delivery counters summed across all loops
    pub fn totals(&self) -> DispatchOutcome {
        let mut totals = DispatchOutcome::default();
        for report in &self.loops {
            totals.absorb(report.outcome);
        }
        totals
    }
}

/// Process owner: one routing map, one router, one loop per source
pub struct Adaptor {
    name: String,
    map: Arc<RoutingMap>,
    router: Arc<Router>,
    settings: EngineSettings,
    lifecycle: Lifecycle,
}

impl Adaptor {
    /// Create an adaptor over a routing map
    pub fn new(name: impl Into<String>, map: RoutingMap, settings: EngineSettings) -> Self {
        let map = Arc::new(map);
        let router = Arc::new(Router::new(map.clone()).with_history(settings.history));
        Self {
            name: name.into(),
            map,
            router,
            settings,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Adaptor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The adaptor's run-state machine
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// The routing map driving this adaptor
    pub fn map(&self) -> &Arc<RoutingMap> {
        &self.map
    }

    /// The dispatch engine
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Request a cooperative stop: every source loop observes it at the top
    /// of its next iteration. In-flight polls and dispatches finish first.
    pub fn stop(&self) {
        info!(adaptor = %self.name, "stop requested");
        self.lifecycle.stop();
        for node in self.map.source_nodes() {
            node.lifecycle().stop();
        }
    }

    /// Run the pre-start validation pass: every issue across the whole
    /// graph is collected and reported together, fail-fast.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        self.map.validate(&mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(issues))
        }
    }

    /// Validate, open the graph, drive every source loop to completion,
    /// and close the graph again.
    pub async fn run(self: Arc<Self>) -> Result<RunSummary> {
        self.start_graph().await?;

        let sources = self.map.source_nodes();
        let mut loops = Vec::with_capacity(sources.len());

        if self.settings.concurrent {
            let mut tasks = Vec::with_capacity(sources.len());
            for node in sources {
                let adaptor = Arc::clone(&self);
                tasks.push(tokio::spawn(
                    async move { adaptor.source_loop(node).await },
                ));
            }
            for task in tasks {
                match task.await {
                    Ok(report) => loops.push(report),
                    Err(e) => loops.push(LoopReport::failed(
                        "<task>",
                        EngineError::config(format!("source task panicked: {e}")),
                    )),
                }
            }
        } else {
            for node in sources {
                loops.push(self.source_loop(node).await);
            }
        }

        self.stop_graph().await;

        let summary = RunSummary { loops };
        let totals = summary.totals();
        info!(
            adaptor = %self.name,
            clean = summary.is_clean(),
            sink_arrivals = totals.sink_arrivals,
            discarded = totals.discarded,
            errors_routed = totals.errors_routed,
            "run finished"
        );
        Ok(summary)
    }

    async fn start_graph(&self) -> Result<()> {
        self.validate()?;
        for node in self.map.nodes() {
            if node.is_source() {
                continue;
            }
            node.open()
                .await
                .map_err(|e| EngineError::connect(node.id(), e.to_string()))?;
            node.lifecycle().start();
        }
        self.lifecycle.start();
        info!(
            adaptor = %self.name,
            nodes = self.map.nodes().len(),
            sources = self.map.source_nodes().len(),
            "adaptor started"
        );
        Ok(())
    }

    async fn stop_graph(&self) {
        for node in self.map.nodes() {
            if node.is_source() {
                continue;
            }
            if let Err(e) = node.close().await {
                warn!(node = node.id(), error = %e, "close failed during shutdown");
            }
            node.lifecycle().stop();
        }
        self.lifecycle.stop();
    }

    /// One source poll-loop, driven to its end
    async fn source_loop(&self, node: Arc<Node>) -> LoopReport {
        let Some(source) = node.as_source().cloned() else {
            return LoopReport::failed(
                node.id(),
                EngineError::config(format!("node '{}' is not a source", node.id())),
            );
        };

        if let Err(e) = source.connect().await {
            error!(node = node.id(), error = %e, "source connect failed");
            node.lifecycle().stop();
            return LoopReport::failed(node.id(), EngineError::connect(node.id(), e.to_string()));
        }
        node.lifecycle().start();
        info!(node = node.id(), "source loop started");

        let poll_timeout = self.settings.poll_timeout();
        let mut records_in = 0u64;
        let mut outcome = DispatchOutcome::default();

        let result = loop {
            // cooperative stop, observed at the top of each iteration only
            if node.lifecycle().is_state(RunState::Stopped)
                || self.lifecycle.is_state(RunState::Stopped)
            {
                break Ok(LoopEnd::Stopped);
            }
            if source.is_dry() {
                break Ok(LoopEnd::Exhausted);
            }

            let batch = match source.next(poll_timeout).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(node = node.id(), error = %e, "source poll failed");
                    break Err(EngineError::component(node.id(), e));
                }
            };
            // empty batch: the poll timed out, not exhaustion
            if batch.is_empty() {
                continue;
            }

            match self.router.process_batch(batch, &node).await {
                Ok(result) => {
                    records_in += result.records_in;
                    outcome.absorb(result.outcome);
                }
                Err(e) => {
                    error!(node = node.id(), error = %e, "batch dispatch failed");
                    break Err(e.into());
                }
            }
        };

        if let Err(e) = source.disconnect().await {
            warn!(node = node.id(), error = %e, "source disconnect failed");
        }
        node.lifecycle().stop();
        info!(
            node = node.id(),
            records_in,
            sink_arrivals = outcome.sink_arrivals,
            discarded = outcome.discarded,
            errors_routed = outcome.errors_routed,
            clean = result.is_ok(),
            "source loop finished"
        );

        LoopReport {
            node: node.id().to_string(),
            records_in,
            outcome,
            result,
        }
    }
}

impl std::fmt::Debug for Adaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adaptor")
            .field("name", &self.name)
            .field("nodes", &self.map.nodes().len())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
