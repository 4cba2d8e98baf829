//! End-to-end behavior of logger, tracer and facade wired together.

use std::sync::Arc;
use std::time::Duration;

use ledger_observability::config::LogDestination;
use ledger_observability::correlation::{CorrelationContext, CorrelationId};
use ledger_observability::logging::{LogLevel, REDACTED};
use ledger_observability::spans::{attributes, SpanStatus, TraceOptions};
use serde_json::json;

mod common;

#[derive(Debug, thiserror::Error)]
#[error("ledger locked: {0}")]
struct LedgerLocked(String);

#[tokio::test]
async fn test_trace_async_error_is_exported_and_returned() {
    let (obs, _, exporter) = common::observability(common::test_config());

    let result: Result<(), LedgerLocked> = obs
        .tracer()
        .trace_async("sync.push", TraceOptions::new(), |_span| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(LedgerLocked("boom".into()))
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "ledger locked: boom");

    let span = exporter.find("sync.push").unwrap();
    assert_eq!(span.status, SpanStatus::Error);
    assert_eq!(span.error.as_ref().unwrap().message, "ledger locked: boom");
    assert!(span.events.iter().any(|e| e.name == "exception"));
    assert!(span.end_time_ms.is_some());
}

#[tokio::test]
async fn test_unsampled_failures_still_exported() {
    let mut config = common::test_config();
    config.tracing.sample_rate = 0.0;
    let (obs, _, exporter) = common::observability(config);

    let ok: Result<u32, LedgerLocked> = obs.tracer().trace("import", TraceOptions::new(), |_| Ok(7));
    assert_eq!(ok.unwrap(), 7);
    let _ = obs
        .tracer()
        .trace("import", TraceOptions::new(), |_| -> Result<(), _> { Err(LedgerLocked("x".into())) });

    let spans = exporter.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, SpanStatus::Error);
}

#[test]
fn test_min_level_warn_drops_info() {
    let mut config = common::test_config();
    config.logger.min_level = LogLevel::Warn;
    let (obs, capture, _) = common::observability(config);

    obs.logger().debug("debug", ());
    obs.logger().info("info", ());
    obs.logger().warn("warn", ());
    obs.logger().error("error", ());
    obs.logger().fatal("fatal", ());

    assert_eq!(capture.messages(), vec!["warn", "error", "fatal"]);
}

#[test]
fn test_scoped_operation_ties_logs_and_spans() {
    let (obs, capture, exporter) = common::observability(common::test_config());
    let operation = Arc::new(CorrelationContext::with_id(CorrelationId::from("cor-1-reconcile")));

    let logger = obs.logger().scoped(operation.clone());
    let result: Result<(), LedgerLocked> = obs.tracer().trace(
        "reconcile",
        TraceOptions::new()
            .correlation(operation.clone())
            .attribute("account", "checking"),
        |span| {
            obs.tracer()
                .add_span_event(span, "matched", attributes([("count", 3i64)]));
            logger.info("Reconciled", json!({ "account": "checking", "apiKey": "k-123" }));
            Ok(())
        },
    );
    assert!(result.is_ok());

    let entry = &capture.entries()[0];
    assert_eq!(entry.correlation_id(), Some("cor-1-reconcile"));
    assert_eq!(entry.get("apiKey"), Some(&json!(REDACTED)));
    assert_eq!(entry.get("account"), Some(&json!("checking")));

    let span = exporter.find("reconcile").unwrap();
    assert_eq!(
        span.correlation_id.as_ref().map(|id| id.as_str()),
        Some("cor-1-reconcile")
    );
    assert_eq!(span.status, SpanStatus::Ok);
}

#[test]
fn test_error_entries_carry_error_info() {
    let (obs, capture, _) = common::observability(common::test_config());
    obs.logger()
        .error_with("Sync failed", &LedgerLocked("by device-b".into()), json!({ "attempt": 2 }));

    let entry = &capture.entries()[0];
    let error = entry.error().unwrap();
    assert_eq!(error.name, "LedgerLocked");
    assert_eq!(error.message, "ledger locked: by device-b");
    assert_eq!(entry.get("attempt"), Some(&json!(2)));
    assert_eq!(entry.level(), LogLevel::Error);
}

#[test]
fn test_export_shape() {
    let (obs, _, _) = common::observability(common::test_config());
    let facade = obs.facade();
    facade.conflicts().record_conflict("transaction", "concurrent_edit", true, Some(250));
    facade.sync_latency().record_sync_latency("device-a", "push", 90.0, 5, 4_096, true);
    facade.sync_latency().record_sync_latency("device-a", "push", 110.0, 5, 4_096, false);
    facade.user_activity().record_activity("alice", "create", "transactions", None);
    facade.feature_adoption().record_feature_usage("disc_copy", "alice");
    facade.api_errors().record_api_call("/sync", false);

    let export = serde_json::to_value(facade.export_metrics()).unwrap();
    let summary = &export["summary"];
    assert_eq!(summary["conflicts"]["perHour"], 1.0);
    assert_eq!(summary["conflicts"]["byType"]["transaction"], 1);
    assert_eq!(summary["sync"]["successRate"], 50.0);
    assert_eq!(summary["users"]["activeLastHour"], 1);
    assert_eq!(summary["features"]["mostUsed"][0]["feature"], "disc_copy");
    assert_eq!(summary["api"]["overallErrorRate"], 0.0);

    assert!(export["timestamp"].as_str().unwrap().ends_with('Z'));
    assert!(export["raw"]["summary"]["metricCount"].as_u64().unwrap() >= 5);
    assert_eq!(export["raw"]["details"]["sync_latency_ms"]["count"], 2);
}

#[tokio::test]
async fn test_buffered_console_delivers_on_timer() {
    use ledger_observability::logging::{ConsoleStream, ConsoleWriter};
    use ledger_observability::Observability;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<(ConsoleStream, String)>>);
    impl ConsoleWriter for Lines {
        fn write_line(&self, stream: ConsoleStream, line: &str) {
            self.0.lock().unwrap().push((stream, line.to_string()));
        }
    }

    let mut config = common::test_config();
    config.logger.destination = LogDestination::Console;
    config.buffer.enabled = true;
    config.buffer.max_size = 100;
    config.buffer.flush_interval_ms = 20;
    let lines = Arc::new(Lines::default());
    let obs = Observability::builder(config).console(lines.clone()).build();

    obs.logger().info("queued", ());
    obs.logger().error("also queued", ());
    assert!(lines.0.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let lines = lines.0.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, ConsoleStream::Info);
        assert_eq!(lines[1].0, ConsoleStream::Error);
        let first: serde_json::Value = serde_json::from_str(&lines[0].1).unwrap();
        assert_eq!(first["message"], "queued");
    }

    obs.shutdown();
    obs.logger().warn("after shutdown", ());
    assert_eq!(lines.0.lock().unwrap().len(), 3);
}
