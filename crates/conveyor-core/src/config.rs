//! Configuration types for the Conveyor engine
//!
//! A YAML file declares the components (sources, stages, sinks), the
//! routing edges between them, and the engine settings. [`EngineConfig`]
//! turns that declaration plus a [`ComponentRegistry`] into a wired
//! [`Adaptor`]:
//!
//! ```yaml
//! settings:
//!   poll_timeout_ms: 500
//! sources:
//!   reader:
//!     component: sequence
//!     config:
//!       records: ["a", "b"]
//! sinks:
//!   writer:
//!     component: stdout
//! routes:
//!   process:
//!     reader: [writer]
//! ```

use crate::adaptor::Adaptor;
use crate::error::{EngineError, ErrorKind, Result};
use crate::node::Node;
use crate::registry::ComponentRegistry;
use crate::routing::{RoutingMap, RoutingMapBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Engine-level settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineSettings {
    /// Poll timeout handed to `Source::next`, in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    #[validate(range(min = 1))]
    pub poll_timeout_ms: u64,

    /// Track the ordered node history on every message
    #[serde(default)]
    pub history: bool,

    /// Run one task per source (true) or drive the loops sequentially on
    /// the calling task (false, deterministic)
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            history: false,
            concurrent: default_concurrent(),
        }
    }
}

impl EngineSettings {
    /// The poll timeout as a duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_concurrent() -> bool {
    true
}

fn default_version() -> String {
    "1".to_string()
}

fn default_name() -> String {
    "conveyor".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_component_config() -> serde_yaml::Value {
    serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
}

fn default_error_kind() -> ErrorKind {
    ErrorKind::Any
}

/// One configured component instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Registered component type (e.g. "sequence", "stdout")
    pub component: String,

    /// Component-specific configuration, passed to the factory
    #[serde(default = "default_component_config")]
    pub config: serde_yaml::Value,

    /// Disabled entries are skipped entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// One error binding in the route table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRoute {
    /// Node the binding is registered on
    pub node: String,

    /// Error kind the binding matches; defaults to the wildcard
    #[serde(default = "default_error_kind")]
    pub kind: ErrorKind,

    /// Ordered destination node ids
    pub to: Vec<String>,
}

/// Routing edges, by node id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteTable {
    /// Ordered process destinations per node
    #[serde(default)]
    pub process: HashMap<String, Vec<String>>,

    /// Ordered discard destinations per node
    #[serde(default)]
    pub discard: HashMap<String, Vec<String>>,

    /// Ordered error bindings (registration order matters)
    #[serde(default)]
    pub error: Vec<ErrorRoute>,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,

    /// Adaptor name, used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Engine settings
    #[serde(default)]
    pub settings: EngineSettings,

    /// Source components by node id
    #[serde(default)]
    pub sources: HashMap<String, ComponentEntry>,

    /// Stage components by node id
    #[serde(default)]
    pub stages: HashMap<String, ComponentEntry>,

    /// Sink components by node id
    #[serde(default)]
    pub sinks: HashMap<String, ComponentEntry>,

    /// Routing edges
    #[serde(default)]
    pub routes: RouteTable,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Enabled source entries
    pub fn enabled_sources(&self) -> impl Iterator<Item = (&String, &ComponentEntry)> {
        self.sources.iter().filter(|(_, e)| e.enabled)
    }

    /// Enabled stage entries
    pub fn enabled_stages(&self) -> impl Iterator<Item = (&String, &ComponentEntry)> {
        self.stages.iter().filter(|(_, e)| e.enabled)
    }

    /// Enabled sink entries
    pub fn enabled_sinks(&self) -> impl Iterator<Item = (&String, &ComponentEntry)> {
        self.sinks.iter().filter(|(_, e)| e.enabled)
    }

    /// Instantiate every enabled component through the registry, wire the
    /// route table, and produce an adaptor ready to validate and run.
    pub fn build(&self, registry: &ComponentRegistry) -> Result<Adaptor> {
        self.settings
            .validate()
            .map_err(|e| EngineError::config(format!("invalid settings: {e}")))?;

        let mut nodes: HashMap<String, Arc<Node>> = HashMap::new();

        // deterministic creation order: sources, stages, sinks, each by name
        let mut sources: Vec<_> = self.enabled_sources().collect();
        sources.sort_by_key(|(name, _)| name.as_str());
        for (name, entry) in sources {
            let factory = registry.source(&entry.component).ok_or_else(|| {
                EngineError::config(format!(
                    "unknown source component '{}' for node '{}'; available: {:?}",
                    entry.component,
                    name,
                    registry.list_sources()
                ))
            })?;
            let source = factory.create(&entry.config)?;
            self.insert_node(&mut nodes, name, Node::source(name.as_str(), source))?;
        }

        let mut stages: Vec<_> = self.enabled_stages().collect();
        stages.sort_by_key(|(name, _)| name.as_str());
        for (name, entry) in stages {
            let factory = registry.stage(&entry.component).ok_or_else(|| {
                EngineError::config(format!(
                    "unknown stage component '{}' for node '{}'; available: {:?}",
                    entry.component,
                    name,
                    registry.list_stages()
                ))
            })?;
            let stage = factory.create(&entry.config)?;
            self.insert_node(&mut nodes, name, Node::stage(name.as_str(), stage))?;
        }

        let mut sinks: Vec<_> = self.enabled_sinks().collect();
        sinks.sort_by_key(|(name, _)| name.as_str());
        for (name, entry) in sinks {
            let factory = registry.sink(&entry.component).ok_or_else(|| {
                EngineError::config(format!(
                    "unknown sink component '{}' for node '{}'; available: {:?}",
                    entry.component,
                    name,
                    registry.list_sinks()
                ))
            })?;
            let sink = factory.create(&entry.config)?;
            self.insert_node(&mut nodes, name, Node::sink(name.as_str(), sink))?;
        }

        let map = self.wire_routes(&nodes)?;
        Ok(Adaptor::new(
            self.name.clone(),
            map,
            self.settings.clone(),
        ))
    }

    fn insert_node(
        &self,
        nodes: &mut HashMap<String, Arc<Node>>,
        name: &str,
        node: Arc<Node>,
    ) -> Result<()> {
        if nodes.insert(name.to_string(), node).is_some() {
            return Err(EngineError::config(format!(
                "node id '{}' is declared more than once",
                name
            )));
        }
        Ok(())
    }

    fn wire_routes(&self, nodes: &HashMap<String, Arc<Node>>) -> Result<RoutingMap> {
        fn resolve<'a>(
            nodes: &'a HashMap<String, Arc<Node>>,
            id: &str,
            context: &str,
        ) -> Result<&'a Arc<Node>> {
            nodes.get(id).ok_or_else(|| {
                EngineError::config(format!("{} references unknown node '{}'", context, id))
            })
        }

        let mut builder = RoutingMapBuilder::default();

        // register every node so isolated ones still show up in validation
        let mut names: Vec<_> = nodes.keys().collect();
        names.sort();
        for name in names {
            builder = builder.node(&nodes[name]);
        }

        let mut process: Vec<_> = self.routes.process.iter().collect();
        process.sort_by_key(|(from, _)| from.as_str());
        for (from, to) in process {
            let from_node = resolve(nodes, from, "process route")?.clone();
            let destinations = to
                .iter()
                .map(|id| resolve(nodes, id, "process route").cloned())
                .collect::<Result<Vec<_>>>()?;
            builder = builder.route(&from_node, &destinations);
        }

        let mut discard: Vec<_> = self.routes.discard.iter().collect();
        discard.sort_by_key(|(from, _)| from.as_str());
        for (from, to) in discard {
            let from_node = resolve(nodes, from, "discard route")?.clone();
            let destinations = to
                .iter()
                .map(|id| resolve(nodes, id, "discard route").cloned())
                .collect::<Result<Vec<_>>>()?;
            builder = builder.route_discard(&from_node, &destinations);
        }

        for route in &self.routes.error {
            let from_node = resolve(nodes, &route.node, "error route")?.clone();
            let destinations = route
                .to
                .iter()
                .map(|id| resolve(nodes, id, "error route").cloned())
                .collect::<Result<Vec<_>>>()?;
            builder = builder.route_error(&from_node, route.kind, &destinations);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.poll_timeout_ms, 1000);
        assert!(!settings.history);
        assert!(settings.concurrent);
        assert_eq!(settings.poll_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_settings_validation() {
        let settings = EngineSettings {
            poll_timeout_ms: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = EngineConfig::from_yaml(
            r#"
sources:
  reader:
    component: sequence
    config:
      records: ["a", "b"]
sinks:
  writer:
    component: stdout
routes:
  process:
    reader: [writer]
"#,
        )
        .unwrap();

        assert_eq!(config.version, "1");
        assert_eq!(config.name, "conveyor");
        assert_eq!(config.sources.len(), 1);
        assert!(config.sources["reader"].enabled);
        assert_eq!(config.routes.process["reader"], vec!["writer"]);
    }

    #[test]
    fn test_parse_error_routes() {
        let config = EngineConfig::from_yaml(
            r#"
routes:
  error:
    - node: p
      kind: timeout
      to: [discards]
    - node: p
      to: [errors]
"#,
        )
        .unwrap();

        assert_eq!(config.routes.error.len(), 2);
        assert_eq!(config.routes.error[0].kind, ErrorKind::Timeout);
        // unspecified kind defaults to the wildcard
        assert_eq!(config.routes.error[1].kind, ErrorKind::Any);
    }

    #[test]
    fn test_disabled_entries_are_skipped() {
        let config = EngineConfig::from_yaml(
            r#"
sources:
  reader:
    component: sequence
    enabled: false
"#,
        )
        .unwrap();
        assert_eq!(config.enabled_sources().count(), 0);
    }

    #[test]
    fn test_build_rejects_unknown_component() {
        let config = EngineConfig::from_yaml(
            r#"
sources:
  reader:
    component: does-not-exist
"#,
        )
        .unwrap();
        let registry = ComponentRegistry::with_builtins();
        let err = config.build(&registry).unwrap_err();
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[test]
    fn test_build_rejects_unknown_route_target() {
        let config = EngineConfig::from_yaml(
            r#"
sources:
  reader:
    component: sequence
routes:
  process:
    reader: [nowhere]
"#,
        )
        .unwrap();
        let registry = ComponentRegistry::with_builtins();
        let err = config.build(&registry).unwrap_err();
        assert!(err.to_string().contains("unknown node 'nowhere'"));
    }

    #[test]
    fn test_build_wires_graph() {
        let config = EngineConfig::from_yaml(
            r#"
settings:
  concurrent: false
sources:
  reader:
    component: sequence
    config:
      records: ["a"]
sinks:
  writer:
    component: stdout
routes:
  process:
    reader: [writer]
"#,
        )
        .unwrap();
        let registry = ComponentRegistry::with_builtins();
        let adaptor = config.build(&registry).unwrap();
        assert!(adaptor.validate().is_ok());
    }
}
