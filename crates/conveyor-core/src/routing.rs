//! Routing configuration
//!
//! The [`RoutingMap`] is the graph: for each node, an ordered list of
//! process destinations, an ordered list of discard destinations, and
//! ordered per-error-kind bindings. Maps are built once at configuration
//! time through [`RoutingMapBuilder`] and live for the process lifetime.

use crate::error::{ErrorKind, ValidationIssue};
use crate::node::Node;
use std::collections::HashMap;
use std::sync::Arc;

/// The routing graph: process, discard and error edges per node
pub struct RoutingMap {
    nodes: Vec<Arc<Node>>,
    process: HashMap<String, Vec<Arc<Node>>>,
    discard: HashMap<String, Vec<Arc<Node>>>,
    errors: HashMap<String, Vec<(ErrorKind, Vec<Arc<Node>>)>>,
}

impl RoutingMap {
    /// Start building a routing map
    pub fn builder() -> RoutingMapBuilder {
        RoutingMapBuilder::default()
    }

    /// All registered nodes, in registration order
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// The graph's entry nodes (nodes wrapping a source)
    pub fn source_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().filter(|n| n.is_source()).cloned().collect()
    }

    /// Ordered process destinations of a node; empty means the node is a
    /// terminal sink
    pub fn process_destinations(&self, id: &str) -> &[Arc<Node>] {
        self.process.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ordered discard destinations of a node
    pub fn discard_destinations(&self, id: &str) -> &[Arc<Node>] {
        self.discard.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The ordered error bindings registered for a node
    pub fn error_bindings(&self, id: &str) -> &[(ErrorKind, Vec<Arc<Node>>)] {
        self.errors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the destinations for a failure of kind `kind` raised at node
    /// `id`.
    ///
    /// Walks the kind's ancestor chain most-specific-first; at each visited
    /// kind with a registered binding, appends that binding's destination
    /// list, skipping destinations already appended (deduplicated by node
    /// id). An empty result means the failure is unroutable from this node.
    pub fn error_destinations(&self, id: &str, kind: ErrorKind) -> Vec<Arc<Node>> {
        let Some(bindings) = self.errors.get(id) else {
            return Vec::new();
        };
        let mut resolved: Vec<Arc<Node>> = Vec::new();
        for ancestor in kind.ancestors() {
            let Some((_, destinations)) = bindings.iter().find(|(bound, _)| *bound == ancestor)
            else {
                continue;
            };
            for destination in destinations {
                if !resolved.iter().any(|d| d.id() == destination.id()) {
                    resolved.push(destination.clone());
                }
            }
        }
        resolved
    }

    /// Collect structural validation issues plus each node's own findings.
    ///
    /// Issues are collected, never thrown, so the whole graph is reported
    /// at once.
    pub fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        if self.nodes.is_empty() {
            issues.push(ValidationIssue::new("graph", "no nodes configured"));
            return;
        }
        if !self.nodes.iter().any(|n| n.is_source()) {
            issues.push(ValidationIssue::new("graph", "no source node configured"));
        }
        for node in &self.nodes {
            if node.is_source() && self.process_destinations(node.id()).is_empty() {
                issues.push(ValidationIssue::new(
                    node.id(),
                    "source node has no process destinations",
                ));
            }
            node.validate(issues);
        }
        self.detect_cycles(issues);
    }

    /// DFS over the union of process, discard and error edges. Dispatch is
    /// an unbounded-depth recursion, so any reachable cycle would never
    /// terminate.
    fn detect_cycles(&self, issues: &mut Vec<ValidationIssue>) {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(
            map: &RoutingMap,
            id: &str,
            marks: &mut HashMap<String, Mark>,
            issues: &mut Vec<ValidationIssue>,
        ) {
            match marks.get(id).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return,
                Mark::InProgress => {
                    issues.push(ValidationIssue::new(
                        "graph",
                        format!("routing cycle through node '{}'", id),
                    ));
                    return;
                }
                Mark::Unvisited => {}
            }
            marks.insert(id.to_string(), Mark::InProgress);
            let successors = map
                .process_destinations(id)
                .iter()
                .chain(map.discard_destinations(id).iter())
                .chain(
                    map.error_bindings(id)
                        .iter()
                        .flat_map(|(_, dests)| dests.iter()),
                );
            for successor in successors {
                visit(map, successor.id(), marks, issues);
            }
            marks.insert(id.to_string(), Mark::Done);
        }

        let mut marks = HashMap::new();
        for node in &self.nodes {
            visit(self, node.id(), &mut marks, issues);
        }
    }
}

impl std::fmt::Debug for RoutingMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingMap")
            .field("nodes", &self.nodes.len())
            .field("process_edges", &self.process.len())
            .field("discard_edges", &self.discard.len())
            .field("error_bindings", &self.errors.len())
            .finish()
    }
}

/// Builder for [`RoutingMap`]
///
/// Destination nodes referenced by an edge are registered automatically;
/// `node` exists for participants with no edges of their own.
#[derive(Default)]
pub struct RoutingMapBuilder {
    nodes: Vec<Arc<Node>>,
    process: HashMap<String, Vec<Arc<Node>>>,
    discard: HashMap<String, Vec<Arc<Node>>>,
    errors: HashMap<String, Vec<(ErrorKind, Vec<Arc<Node>>)>>,
}

impl RoutingMapBuilder {
    /// Register a node without edges
    pub fn node(mut self, node: &Arc<Node>) -> Self {
        self.ensure(node);
        self
    }

    /// Append ordered process destinations for `from`
    pub fn route(mut self, from: &Arc<Node>, to: &[Arc<Node>]) -> Self {
        self.ensure(from);
        for dest in to {
            self.ensure(dest);
        }
        self.process
            .entry(from.id().to_string())
            .or_default()
            .extend(to.iter().cloned());
        self
    }

    /// Append ordered discard destinations for `from`
    pub fn route_discard(mut self, from: &Arc<Node>, to: &[Arc<Node>]) -> Self {
        self.ensure(from);
        for dest in to {
            self.ensure(dest);
        }
        self.discard
            .entry(from.id().to_string())
            .or_default()
            .extend(to.iter().cloned());
        self
    }

    /// Bind an error kind on `from` to ordered destinations. Bindings keep
    /// registration order; the first binding for a kind wins resolution.
    pub fn route_error(mut self, from: &Arc<Node>, kind: ErrorKind, to: &[Arc<Node>]) -> Self {
        self.ensure(from);
        for dest in to {
            self.ensure(dest);
        }
        self.errors
            .entry(from.id().to_string())
            .or_default()
            .push((kind, to.to_vec()));
        self
    }

    /// Finish the map
    pub fn build(self) -> RoutingMap {
        RoutingMap {
            nodes: self.nodes,
            process: self.process,
            discard: self.discard,
            errors: self.errors,
        }
    }

    fn ensure(&mut self, node: &Arc<Node>) {
        if !self.nodes.iter().any(|n| n.id() == node.id()) {
            self.nodes.push(node.clone());
        }
    }
}
