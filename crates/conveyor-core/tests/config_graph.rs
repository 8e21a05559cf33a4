//! Config-driven graph tests: YAML → registry → adaptor → run

use conveyor_core::{ComponentRegistry, EngineConfig, EngineError};
use std::sync::Arc;

#[tokio::test]
async fn test_yaml_graph_runs_to_exhaustion() {
    let config = EngineConfig::from_yaml(
        r#"
name: orders
settings:
  concurrent: false
sources:
  reader:
    component: sequence
    config:
      records:
        - {kind: order, id: 1}
        - {kind: refund, id: 2}
        - {kind: order, id: 3}
      batch_size: 2
stages:
  orders-only:
    component: field-transform
    config:
      steps:
        - op: filter
          field: kind
          equals: order
        - op: add_field
          field: source
          value: crm
sinks:
  writer:
    component: stdout
  rejects:
    component: stdout
routes:
  process:
    reader: [orders-only]
    orders-only: [writer]
  discard:
    orders-only: [rejects]
"#,
    )
    .unwrap();

    let registry = ComponentRegistry::with_builtins();
    let adaptor = Arc::new(config.build(&registry).unwrap());
    adaptor.validate().unwrap();

    let summary = adaptor.run().await.unwrap();
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.loops.len(), 1);
    assert_eq!(summary.loops[0].records_in, 3);
    // two orders pass the filter, the refund leaves via the discard edge
    // and still reaches a terminal sink
    assert_eq!(summary.totals().discarded, 1);
    assert_eq!(summary.totals().sink_arrivals, 3);
}

#[tokio::test]
async fn test_yaml_error_routes_resolve_kinds() {
    let config = EngineConfig::from_yaml(
        r#"
settings:
  concurrent: false
sources:
  reader:
    component: sequence
    config:
      records: [1]
sinks:
  writer:
    component: stdout
  errors:
    component: stdout
routes:
  process:
    reader: [writer]
  error:
    - node: reader
      kind: timeout
      to: [errors]
    - node: reader
      to: [errors]
"#,
    )
    .unwrap();

    let registry = ComponentRegistry::with_builtins();
    let adaptor = config.build(&registry).unwrap();

    let map = adaptor.map();
    assert_eq!(map.error_bindings("reader").len(), 2);
    let resolved = map.error_destinations("reader", conveyor_core::ErrorKind::Timeout);
    // both bindings name the same destination; identity dedup keeps one
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id(), "errors");
}

#[test]
fn test_validation_collects_all_issues() {
    // an empty sequence source and a dangling graph both surface, together
    let config = EngineConfig::from_yaml(
        r#"
sources:
  reader:
    component: sequence
sinks:
  writer:
    component: stdout
"#,
    )
    .unwrap();

    let registry = ComponentRegistry::with_builtins();
    let adaptor = config.build(&registry).unwrap();

    let err = adaptor.validate().unwrap_err();
    let EngineError::Validation(issues) = err else {
        panic!("expected validation error");
    };
    // no records configured + source without process destinations
    assert!(issues.len() >= 2, "issues: {:?}", issues);
}
