//! Admin API over a real listener.

use ledger_observability::admin::handlers::UNMATCHED_ENDPOINT;
use ledger_observability::correlation::X_CORRELATION_ID;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_requires_bearer_token() {
    let (obs, _, _) = common::observability(common::test_config());
    let (addr, shutdown) = common::start_admin(obs.clone()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/admin/status", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("http://{}/admin/status", addr))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Rejected calls still count against the endpoint.
    assert_eq!(obs.facade().api_errors().error_rate("/admin/status"), 100.0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_status_and_correlation_echo() {
    let (obs, _, _) = common::observability(common::test_config());
    let (addr, shutdown) = common::start_admin(obs).await;

    let res = common::client()
        .get(format!("http://{}/admin/status", addr))
        .bearer_auth(common::API_KEY)
        .header(X_CORRELATION_ID, "cor-42-cli")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(X_CORRELATION_ID).unwrap().to_str().unwrap(),
        "cor-42-cli"
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["service"], "ledger-test");
    assert_eq!(body["sampleRate"], 1.0);
    assert_eq!(body["minLogLevel"], "info");

    shutdown.trigger();
}

#[tokio::test]
async fn test_summary_and_export() {
    let (obs, capture, _) = common::observability(common::test_config());
    obs.facade()
        .sync_latency()
        .record_sync_latency("device-a", "pull", 42.0, 2, 128, true);
    let (addr, shutdown) = common::start_admin(obs).await;
    let client = common::client();

    let summary: Value = client
        .get(format!("http://{}/admin/summary", addr))
        .bearer_auth(common::API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["sync"]["p50"], 42.0);
    assert_eq!(summary["sync"]["avgLatencyByClient"]["device-a"], 42.0);

    let res = client
        .get(format!("http://{}/admin/export", addr))
        .bearer_auth(common::API_KEY)
        .header(X_CORRELATION_ID, "cor-7-export")
        .send()
        .await
        .unwrap();
    let export: Value = res.json().await.unwrap();
    assert!(export["raw"]["details"]["sync_latency_ms"].is_object());
    assert!(export["timestamp"].is_string());

    let logged = capture
        .entries()
        .into_iter()
        .find(|e| e.message() == "Metrics exported")
        .unwrap();
    assert_eq!(logged.correlation_id(), Some("cor-7-export"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_recent_spans_and_missing_prometheus() {
    let (obs, _, _) = common::observability(common::test_config());
    for name in ["a", "b", "c"] {
        let span = obs.tracer().start_span(name, Default::default(), None);
        obs.tracer().end_span(&span, true, None);
    }
    let (addr, shutdown) = common::start_admin(obs.clone()).await;
    let client = common::client();

    let spans: Vec<Value> = client
        .get(format!("http://{}/admin/spans?limit=2", addr))
        .bearer_auth(common::API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = spans.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["b", "c"]);

    let res = client
        .get(format!("http://{}/metrics", addr))
        .bearer_auth(common::API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(obs.facade().api_errors().error_rate("/metrics"), 100.0);
    assert_eq!(obs.facade().api_errors().error_rate("/admin/spans"), 0.0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unrouted_paths_share_one_tracker_key() {
    let (obs, _, _) = common::observability(common::test_config());
    let (addr, shutdown) = common::start_admin(obs.clone()).await;
    let client = common::client();

    for i in 0..25 {
        let res = client
            .get(format!("http://{}/scan/{}", addr, i))
            .send()
            .await
            .unwrap();
        assert!(res.status().is_client_error());
    }

    let api = obs.facade().api_errors();
    assert!((0..25).all(|i| api.stats(&format!("/scan/{}", i)).is_none()));
    let unmatched = api.stats(UNMATCHED_ENDPOINT).unwrap();
    assert_eq!(unmatched.total, 25);
    assert_eq!(unmatched.errors, 25);
    assert_eq!(api.top_error_endpoints(10).len(), 1);

    shutdown.trigger();
}
