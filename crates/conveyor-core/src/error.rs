//! Error types for the Conveyor engine
//!
//! Provides structured error handling for both the engine runtime and the
//! components running inside it. In-flight processing failures carry an
//! [`ErrorKind`] from a closed taxonomy; error routing resolves a kind
//! against a node's bindings by walking the kind's ancestor chain, so the
//! hierarchy is a static lookup rather than runtime reflection.

use std::fmt;
use thiserror::Error;

/// Result type alias for engine runtime operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for component operations
pub type ComponentResult<T> = std::result::Result<T, StageError>;

/// Closed taxonomy of processing-failure kinds.
///
/// Kinds form a tree rooted at [`ErrorKind::Any`]; routing bindings may be
/// registered on any kind, and a raised kind matches bindings on itself and
/// every ancestor, most specific first.
///
/// ```text
/// Any
/// ├── Transient ── Connection | Timeout | RateLimited
/// ├── Data ─────── Serialization | Schema
/// ├── Processing
/// ├── Resource
/// └── Fatal ────── Internal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Root of the taxonomy; matches every failure (wildcard binding)
    Any,
    /// Failures that may succeed on retry
    Transient,
    /// Connection to an external system failed
    Connection,
    /// Timeout waiting for an external system
    Timeout,
    /// Rate limited by an external system
    RateLimited,
    /// Record-content failures
    Data,
    /// Serialization/deserialization failure
    Serialization,
    /// Record does not match the expected shape
    Schema,
    /// Stage-level processing failure
    Processing,
    /// Transactional resource failure
    Resource,
    /// Failures that will not succeed on retry
    Fatal,
    /// Internal engine or component bug
    Internal,
}

impl ErrorKind {
    /// Parent kind in the taxonomy; `None` for the root
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            Self::Any => None,
            Self::Transient | Self::Data | Self::Processing | Self::Resource | Self::Fatal => {
                Some(Self::Any)
            }
            Self::Connection | Self::Timeout | Self::RateLimited => Some(Self::Transient),
            Self::Serialization | Self::Schema => Some(Self::Data),
            Self::Internal => Some(Self::Fatal),
        }
    }

    /// Iterate `[self, parent, …, Any]`, most specific first
    pub fn ancestors(self) -> Ancestors {
        Ancestors { next: Some(self) }
    }

    /// Whether `self` is `other` or a descendant of it
    pub fn is_a(self, other: ErrorKind) -> bool {
        self.ancestors().any(|k| k == other)
    }

    /// Whether a failure of this kind may succeed on retry
    pub fn is_transient(self) -> bool {
        self.is_a(ErrorKind::Transient)
    }

    /// Stable string form, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Transient => "transient",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Data => "data",
            Self::Serialization => "serialization",
            Self::Schema => "schema",
            Self::Processing => "processing",
            Self::Resource => "resource",
            Self::Fatal => "fatal",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Iterator over an error kind's ancestor chain
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<ErrorKind>,
}

impl Iterator for Ancestors {
    type Item = ErrorKind;

    fn next(&mut self) -> Option<ErrorKind> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// An in-flight processing failure raised by a component.
///
/// Carries the taxonomy kind used by error routing plus a human-readable
/// message. Unroutable stage errors become fatal to their poll-loop.
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct StageError {
    kind: ErrorKind,
    message: String,
}

impl StageError {
    /// Create an error of an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processing, message)
    }

    /// Create a transactional-resource error
    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, message)
    }

    /// Create a fatal error
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The taxonomy kind of this failure
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this failure may succeed on retry
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Routing failure raised while dispatching a record through the graph
#[derive(Debug, Error)]
pub enum RouteError {
    /// A stage failure with no registered error destination
    #[error("no error route from node '{node}': {source}")]
    Unrouted {
        node: String,
        #[source]
        source: StageError,
    },

    /// A transactional resource refused to commit the batch
    #[error("commit failed: {0}")]
    Commit(String),
}

impl RouteError {
    /// Check if this is an unrouted stage failure
    pub fn is_unrouted(&self) -> bool {
        matches!(self, Self::Unrouted { .. })
    }
}

/// A pre-run validation finding.
///
/// Validation collects issues across the whole graph instead of failing on
/// the first one, so a misconfigured adaptor reports everything at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Component or graph element the issue belongs to
    pub component: String,
    /// What is wrong
    pub message: String,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.message)
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for the engine runtime
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A node failed to connect or disconnect
    #[error("Node '{node}' connect error: {message}")]
    Connect { node: String, message: String },

    /// A component failed outside of record dispatch (e.g. polling)
    #[error("Node '{node}' error: {source}")]
    Component {
        node: String,
        #[source]
        source: StageError,
    },

    /// Pre-run validation found issues
    #[error("validation failed: {}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Routing error
    #[error(transparent)]
    Route(#[from] RouteError),
}

impl EngineError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connect error for a node
    pub fn connect(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connect {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a component error for a node
    pub fn component(node: impl Into<String>, source: StageError) -> Self {
        Self::Component {
            node: node.into(),
            source,
        }
    }

    /// Check if this error is an unrouted stage failure
    pub fn is_unrouted(&self) -> bool {
        matches!(self, Self::Route(r) if r.is_unrouted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_chain() {
        let chain: Vec<ErrorKind> = ErrorKind::Timeout.ancestors().collect();
        assert_eq!(
            chain,
            vec![ErrorKind::Timeout, ErrorKind::Transient, ErrorKind::Any]
        );

        let root: Vec<ErrorKind> = ErrorKind::Any.ancestors().collect();
        assert_eq!(root, vec![ErrorKind::Any]);
    }

    #[test]
    fn test_is_a() {
        assert!(ErrorKind::Timeout.is_a(ErrorKind::Transient));
        assert!(ErrorKind::Timeout.is_a(ErrorKind::Any));
        assert!(ErrorKind::Serialization.is_a(ErrorKind::Data));
        assert!(!ErrorKind::Serialization.is_a(ErrorKind::Transient));
        assert!(!ErrorKind::Any.is_a(ErrorKind::Fatal));
    }

    #[test]
    fn test_transient_check() {
        assert!(StageError::connection("refused").is_transient());
        assert!(StageError::timeout("5s").is_transient());
        assert!(!StageError::processing("bad record").is_transient());
        assert!(!StageError::fatal("unrecoverable").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = StageError::timeout("no response after 5s");
        assert_eq!(err.to_string(), "timeout error: no response after 5s");

        let err = EngineError::connect("reader", "connection refused");
        assert_eq!(
            err.to_string(),
            "Node 'reader' connect error: connection refused"
        );
    }

    #[test]
    fn test_kind_serde_round_trip() {
        let json = serde_json::to_string(&ErrorKind::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
        let kind: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, ErrorKind::RateLimited);
        assert_eq!(kind.as_str(), "rate_limited");
    }

    #[test]
    fn test_validation_display() {
        let err = EngineError::Validation(vec![
            ValidationIssue::new("reader", "no records configured"),
            ValidationIssue::new("graph", "cycle through 'writer'"),
        ]);
        let text = err.to_string();
        assert!(text.contains("reader: no records configured"));
        assert!(text.contains("graph: cycle through 'writer'"));
    }

    #[test]
    fn test_unrouted_check() {
        let route = RouteError::Unrouted {
            node: "p".to_string(),
            source: StageError::processing("boom"),
        };
        assert!(route.is_unrouted());
        assert!(EngineError::from(route).is_unrouted());
        assert!(!EngineError::config("bad").is_unrouted());
    }
}
