//! Contract Tests for the Local and Remote Transports
//!
//! The same canned datasource is served in-process (`TestDataPlugin`) and
//! over the wire (`WireStub`). Every contract operation must give the same
//! observable result through both transports, and through an empty
//! middleware pipeline.
//!
//! Run: cargo test --test transport_contract_tests

mod mock_plugins;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use backend_plugin_client::Pipeline;
use backend_plugin_client::plugin::prelude::*;
use backend_plugin_client::transport::{LocalTransport, RemoteTransport};

use mock_plugins::{METRICS, PanickingPlugin, TestDataPlugin, WireStub};

fn local() -> Arc<dyn Client> {
    Arc::new(LocalTransport::new("testdata", TestDataPlugin::new().backend()))
}

fn remote() -> Arc<dyn Client> {
    Arc::new(RemoteTransport::new("testdata", Arc::new(WireStub::new("local"))))
}

/// Both transports, bare and behind an empty pipeline
fn transports() -> Vec<(&'static str, Arc<dyn Client>)> {
    vec![
        ("local", local()),
        ("remote", remote()),
        ("local+pipeline", Pipeline::new().wrap(local())),
        ("remote+pipeline", Pipeline::new().wrap(remote())),
    ]
}

fn query_request() -> QueryDataRequest {
    QueryDataRequest::new(
        PluginContext::new(1, "testdata"),
        vec![
            DataQuery::new("A", json!({"expr": "up"})),
            DataQuery::new("B", json!({"expr": "rate(x[5m])"})),
        ],
    )
}

#[tokio::test]
async fn test_query_data_frames_match_across_transports() {
    let mut results = Vec::new();
    for (name, client) in transports() {
        let response = assert_ok!(
            client.query_data(&CallContext::new(), query_request()).await,
            "{} query failed",
            name
        );
        results.push((name, response));
    }

    let (_, reference) = &results[0];
    let frames = &reference.get("A").unwrap().frames;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].executed_query_string(), Some("up"));
    assert_eq!(
        frames[0].fields[1].display_name(),
        Some(r#"value{partition="local"}"#)
    );

    for (name, response) in &results[1..] {
        for ref_id in ["A", "B"] {
            assert_eq!(
                response.get(ref_id).unwrap().frames,
                reference.get(ref_id).unwrap().frames,
                "{name} differs for {ref_id}"
            );
        }
    }
}

#[tokio::test]
async fn test_check_health_and_metrics_match() {
    for (name, client) in transports() {
        let ctx = CallContext::new();
        let health = client
            .check_health(&ctx, CheckHealthRequest::default())
            .await
            .unwrap();
        assert_eq!(health.status, HealthStatus::Ok, "{name}");
        assert_eq!(health.message, "Data source is working", "{name}");

        let metrics = client
            .collect_metrics(&ctx, CollectMetricsRequest::default())
            .await
            .unwrap();
        assert_eq!(metrics.prometheus_metrics.as_ref(), METRICS, "{name}");
    }
}

#[tokio::test]
async fn test_call_resource_chunks_arrive_in_order() {
    for (name, client) in transports() {
        let (tx, mut rx) = mpsc::channel::<CallResourceResponse>(8);
        let req = CallResourceRequest::new(PluginContext::new(1, "testdata"), "GET", "series");
        assert_ok!(client.call_resource(&CallContext::new(), req, &tx).await);
        drop(tx);

        let mut bodies = Vec::new();
        while let Some(chunk) = rx.recv().await {
            assert_eq!(chunk.status, 200, "{name}");
            bodies.push(String::from_utf8_lossy(&chunk.body).to_string());
        }
        assert_eq!(bodies, vec!["path=series", "!", "done"], "{name}");
    }
}

#[tokio::test]
async fn test_stream_negotiation_matches() {
    for (name, client) in transports() {
        let ctx = CallContext::new();
        let subscribed = client
            .subscribe_stream(
                &ctx,
                SubscribeStreamRequest {
                    path: "live".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(subscribed.status, StreamStatus::Ok, "{name}");

        let missing = client
            .subscribe_stream(
                &ctx,
                SubscribeStreamRequest {
                    path: "nope".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(missing.status, StreamStatus::NotFound, "{name}");

        let published = client
            .publish_stream(&ctx, PublishStreamRequest::default())
            .await
            .unwrap();
        assert_eq!(published.status, StreamStatus::PermissionDenied, "{name}");
    }
}

#[tokio::test]
async fn test_remote_run_stream_ends_with_plugin() {
    let (tx, mut rx) = mpsc::channel::<StreamPacket>(8);
    assert_ok!(
        remote()
            .run_stream(&CallContext::new(), RunStreamRequest::default(), &tx)
            .await
    );
    drop(tx);

    let mut packets = Vec::new();
    while let Some(packet) = rx.recv().await {
        packets.push(packet.data);
    }
    assert_eq!(packets.len(), 3);
    assert_eq!(packets[2].as_ref(), b"{\"n\":3}");
}

#[tokio::test]
async fn test_local_run_stream_stops_on_cancel() {
    let plugin = TestDataPlugin::new();
    let client: Arc<dyn Client> = Arc::new(LocalTransport::new("testdata", plugin.backend()));
    let ctx = CallContext::new();
    let (tx, mut rx) = mpsc::channel::<StreamPacket>(8);

    let run_ctx = ctx.clone();
    let handle = tokio::spawn(async move {
        client
            .run_stream(&run_ctx, RunStreamRequest::default(), &tx)
            .await
    });

    for _ in 0..3 {
        assert!(rx.recv().await.is_some());
    }
    ctx.cancellation().cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run_stream did not stop after cancellation")
        .unwrap();
    assert_ok!(result);
    assert!(plugin.stream_packets_sent.load(std::sync::atomic::Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_cancelled_context_fails_unary_calls() {
    for (name, client) in transports() {
        let ctx = CallContext::new();
        ctx.cancellation().cancel();
        let err = assert_err!(client.query_data(&ctx, query_request()).await);
        assert!(err.is_cancelled(), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_missing_capabilities_degrade() {
    let client: Arc<dyn Client> = Arc::new(LocalTransport::new("empty", BackendPlugin::new()));
    let ctx = CallContext::new();

    let err = assert_err!(client.query_data(&ctx, query_request()).await);
    assert!(err.is_not_implemented());

    let health = assert_ok!(client.check_health(&ctx, CheckHealthRequest::default()).await);
    assert_eq!(health.status, HealthStatus::Unknown);

    let metrics = assert_ok!(
        client
            .collect_metrics(&ctx, CollectMetricsRequest::default())
            .await
    );
    assert!(metrics.is_empty());
}

#[tokio::test]
async fn test_plugin_panic_is_contained() {
    let plugin = BackendPlugin::new().with_query_data(Arc::new(PanickingPlugin));
    let client = LocalTransport::new("panicky", plugin);

    let err = assert_err!(client.query_data(&CallContext::new(), query_request()).await);
    assert!(matches!(err, PluginError::Panic(_)), "{err}");

    // The transport stays usable after a panic
    let health = client
        .check_health(&CallContext::new(), CheckHealthRequest::default())
        .await
        .unwrap();
    assert_eq!(health.status, HealthStatus::Unknown);
}
