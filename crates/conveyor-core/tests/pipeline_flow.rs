//! End-to-end pipeline tests: scripted source → stages → capturing sinks
//!
//! These drive whole adaptors in deterministic (sequential) mode and assert
//! on what the sinks received and on the process exit contract.

use conveyor_core::components::{SequenceSource, SequenceSourceConfig};
use conveyor_core::testing::{FailingStage, MockSource, MockStage, RecordingSink};
use conveyor_core::{ErrorKind, ErrorRecord, PipelineBuilder, StageError, StageOutput};
use serde_json::json;
use std::sync::Arc;

/// A stage formatting each record as `name(record)`
fn tagging_stage(name: &'static str) -> MockStage {
    MockStage::new(move |record| {
        let text = record.as_str().unwrap_or_default();
        Ok(StageOutput::single(json!(format!("{}({})", name, text))))
    })
}

#[tokio::test]
async fn test_single_record_through_linear_pipeline() {
    // source emits "foobar" once; the sink must see exactly one record
    // "Processor1(foobar)"; exit code 0
    let sink = RecordingSink::new();

    let adaptor = PipelineBuilder::new("smoke")
        .source("reader", MockSource::with_records(vec![json!("foobar")]))
        .stage("processor", tagging_stage("Processor1"))
        .sink("writer", sink.clone())
        .build()
        .unwrap();

    let summary = Arc::new(adaptor).run().await.unwrap();

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(sink.records(), vec![json!("Processor1(foobar)")]);
    assert_eq!(summary.loops.len(), 1);
    assert_eq!(summary.loops[0].records_in, 1);
    assert_eq!(summary.totals().sink_arrivals, 1);
}

#[tokio::test]
async fn test_failing_processor_with_error_sink() {
    // ten records in batches of three; the processor fails on every 3rd
    // call; the normal sink gets 7 records, the error sink gets 3
    // envelopes, and the run still exits 0 because every failure routed
    let source = SequenceSource::new(SequenceSourceConfig {
        records: vec![json!("x"); 10],
        batch_size: 3,
        repeat: 1,
    });
    let processor = FailingStage::every(3, Arc::new(tagging_stage("p")));
    let sink = RecordingSink::new();
    let errors = RecordingSink::new();

    let adaptor = PipelineBuilder::new("flaky")
        .source("reader", source)
        .stage("processor", processor)
        .sink("writer", sink.clone())
        .error_sink("errors", errors.clone())
        .build()
        .unwrap();

    let summary = Arc::new(adaptor).run().await.unwrap();

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(sink.count(), 7);
    assert!(sink.records().iter().all(|r| r == &json!("p(x)")));

    let routed = errors.records();
    assert_eq!(routed.len(), 3);
    for value in &routed {
        let envelope = ErrorRecord::from_value(value).unwrap();
        assert_eq!(envelope.kind, ErrorKind::Processing);
        assert_eq!(envelope.message, "synthetic failure");
        assert_eq!(envelope.record, json!("x"));
    }

    assert_eq!(summary.loops[0].records_in, 10);
    assert_eq!(summary.totals().errors_routed, 3);
    // every record reached a terminal: 7 normal + 3 error deliveries
    assert_eq!(summary.totals().sink_arrivals, 10);
}

#[tokio::test]
async fn test_failing_processor_without_error_sink_is_fatal() {
    let sink = RecordingSink::new();

    let adaptor = PipelineBuilder::new("doomed")
        .source("reader", MockSource::with_records(vec![json!("x")]))
        .stage(
            "processor",
            MockStage::new(|_| Err(StageError::processing("boom"))),
        )
        .sink("writer", sink.clone())
        .build()
        .unwrap();

    let summary = Arc::new(adaptor).run().await.unwrap();

    assert_eq!(summary.exit_code(), 1);
    assert!(!summary.loops[0].is_clean());
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_multi_stage_pipeline_composes_in_order() {
    let sink = RecordingSink::new();

    let adaptor = PipelineBuilder::new("chain")
        .source("reader", MockSource::with_records(vec![json!("v")]))
        .stage("first", tagging_stage("a"))
        .stage("second", tagging_stage("b"))
        .sink("writer", sink.clone())
        .build()
        .unwrap();

    let summary = Arc::new(adaptor).run().await.unwrap();
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(sink.records(), vec![json!("b(a(v))")]);
}

#[tokio::test]
async fn test_filtering_stage_drops_without_error() {
    // an empty output is "no further action": nothing reaches the sink,
    // nothing is an error, and the run is clean
    let sink = RecordingSink::new();

    let adaptor = PipelineBuilder::new("filtered")
        .source(
            "reader",
            MockSource::with_records(vec![json!(1), json!(2), json!(3)]),
        )
        .stage(
            "evens-only",
            MockStage::new(|record| {
                let n = record.as_i64().unwrap_or(0);
                if n % 2 == 0 {
                    Ok(StageOutput::single(record.clone()))
                } else {
                    Ok(StageOutput::none())
                }
            }),
        )
        .sink("writer", sink.clone())
        .build()
        .unwrap();

    let summary = Arc::new(adaptor).run().await.unwrap();
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(sink.records(), vec![json!(2)]);
    assert_eq!(summary.totals().discarded, 0);
}
