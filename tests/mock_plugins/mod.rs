//! Mock Plugins for Integration Tests
//!
//! Provides the same canned datasource behind every transport:
//! - `TestDataPlugin`: in-process handlers for every capability
//! - `WireStub`: a `PluginStub` speaking the wire messages directly
//! - `PanickingPlugin`: a query handler that panics
//!
//! Both `TestDataPlugin` and `WireStub` answer a query with one frame
//! named after its ref-ID, so results can be compared across transports.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use tonic::Status;

use backend_plugin_client::plugin::prelude::*;
use backend_plugin_client::plugin::SignedInUser;
use backend_plugin_client::transport::remote::WireStream;
use backend_plugin_client::transport::remote::messages as pb;

pub const METRICS: &[u8] = b"# TYPE plugin_up gauge\nplugin_up 1\n";

/// The frame every mock returns for `ref_id`
pub fn series_frame(ref_id: &str, partition: &str) -> Frame {
    Frame::new(format!("series-{ref_id}"))
        .with_field(Field::new("time", vec![json!(1000), json!(2000)]))
        .with_field(
            Field::new("value", vec![json!(1.5), json!(2.5)]).with_label("partition", partition),
        )
}

/// In-process datasource implementing every capability
#[derive(Default)]
pub struct TestDataPlugin {
    pub query_calls: AtomicUsize,
    /// Headers of the last `CheckHealth` and `QueryData` request
    pub last_headers: Mutex<HashMap<String, String>>,
    pub stream_packets_sent: AtomicUsize,
}

impl TestDataPlugin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn backend(self: &Arc<Self>) -> BackendPlugin {
        BackendPlugin::new()
            .with_query_data(self.clone())
            .with_check_health(self.clone())
            .with_collect_metrics(self.clone())
            .with_call_resource(self.clone())
            .with_stream(self.clone())
    }
}

#[async_trait]
impl QueryDataHandler for TestDataPlugin {
    async fn query_data(
        &self,
        _ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock() = req.headers.clone();

        let mut response = QueryDataResponse::new();
        for query in &req.queries {
            if query.json.get("fail").and_then(Value::as_bool) == Some(true) {
                response.insert(&query.ref_id, DataResponse::from_error("query failed"));
                continue;
            }
            response.insert(
                &query.ref_id,
                DataResponse::from_frames(vec![series_frame(&query.ref_id, "local")]),
            );
        }
        Ok(response)
    }
}

#[async_trait]
impl CheckHealthHandler for TestDataPlugin {
    async fn check_health(
        &self,
        _ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        *self.last_headers.lock() = req.headers.clone();
        Ok(CheckHealthResult::new(
            HealthStatus::Ok,
            "Data source is working",
        ))
    }
}

#[async_trait]
impl CollectMetricsHandler for TestDataPlugin {
    async fn collect_metrics(
        &self,
        _ctx: &CallContext,
        _req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        Ok(CollectMetricsResult {
            prometheus_metrics: Bytes::from_static(METRICS),
        })
    }
}

#[async_trait]
impl CallResourceHandler for TestDataPlugin {
    async fn call_resource(
        &self,
        _ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        sender
            .send(CallResourceResponse::new(200, format!("path={}", req.path)))
            .await?;
        sender.send(CallResourceResponse::new(200, "!")).await?;
        sender.send(CallResourceResponse::new(200, "done")).await
    }
}

#[async_trait]
impl StreamHandler for TestDataPlugin {
    async fn subscribe_stream(
        &self,
        _ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        let status = if req.path == "live" {
            StreamStatus::Ok
        } else {
            StreamStatus::NotFound
        };
        Ok(SubscribeStreamResponse {
            status,
            initial_data: None,
        })
    }

    async fn publish_stream(
        &self,
        _ctx: &CallContext,
        _req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        Ok(PublishStreamResponse {
            status: StreamStatus::PermissionDenied,
            data: Bytes::new(),
        })
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        _req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        let mut n = 0u64;
        loop {
            if ctx.is_cancelled() {
                return Ok(());
            }
            n += 1;
            sender
                .send(StreamPacket::from_json(format!("{{\"n\":{n}}}")))
                .await?;
            self.stream_packets_sent.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// A query handler that panics
pub struct PanickingPlugin;

#[async_trait]
impl QueryDataHandler for PanickingPlugin {
    async fn query_data(
        &self,
        _ctx: &CallContext,
        _req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        panic!("plugin bug");
    }
}

/// Fake out-of-process plugin answering at the wire level
#[derive(Default)]
pub struct WireStub {
    pub partition: String,
    pub fail_queries: bool,
    /// Answer `ListEndpoints` with Unimplemented
    pub no_partition_api: bool,
    pub endpoints: Vec<(String, String)>,
    pub query_calls: AtomicUsize,
    pub last_user: Mutex<Option<SignedInUser>>,
}

impl WireStub {
    pub fn new(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
            ..Default::default()
        }
    }

    pub fn with_endpoints(mut self, endpoints: &[(&str, &str)]) -> Self {
        self.endpoints = endpoints
            .iter()
            .map(|(id, address)| (id.to_string(), address.to_string()))
            .collect();
        self
    }
}

#[async_trait]
impl backend_plugin_client::transport::PluginStub for WireStub {
    async fn query_data(
        &self,
        request: pb::QueryDataRequest,
    ) -> Result<pb::QueryDataResponse, Status> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(Status::unavailable("partition down"));
        }
        if let Some(context) = request.plugin_context {
            let context = backend_plugin_client::transport::remote::plugin_context_from_wire(context)
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
            *self.last_user.lock() = context.user;
        }

        let mut response = pb::QueryDataResponse::default();
        for query in request.queries {
            let frame = series_frame(&query.ref_id, &self.partition)
                .to_json_bytes()
                .map_err(|e| Status::internal(e.to_string()))?;
            response.responses.insert(
                query.ref_id,
                pb::DataResponse {
                    frames: vec![frame],
                    error: String::new(),
                    status: 200,
                },
            );
        }
        Ok(response)
    }

    async fn check_health(
        &self,
        _request: pb::CheckHealthRequest,
    ) -> Result<pb::CheckHealthResponse, Status> {
        Ok(pb::CheckHealthResponse {
            status: pb::HealthStatus::Ok as i32,
            message: "Data source is working".to_string(),
            json_details: Vec::new(),
        })
    }

    async fn collect_metrics(
        &self,
        _request: pb::CollectMetricsRequest,
    ) -> Result<pb::CollectMetricsResponse, Status> {
        Ok(pb::CollectMetricsResponse {
            prometheus: Bytes::from_static(METRICS),
        })
    }

    async fn call_resource(
        &self,
        request: pb::CallResourceRequest,
    ) -> Result<WireStream<pb::CallResourceResponse>, Status> {
        let chunks = vec![
            Ok(pb::CallResourceResponse {
                code: 200,
                headers: HashMap::new(),
                body: Bytes::from(format!("path={}", request.path)),
            }),
            Ok(pb::CallResourceResponse {
                code: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(b"!"),
            }),
            Ok(pb::CallResourceResponse {
                code: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(b"done"),
            }),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn subscribe_stream(
        &self,
        request: pb::StreamRequest,
    ) -> Result<pb::StreamResponse, Status> {
        let status = if request.path == "live" {
            pb::StreamStatus::Ok
        } else {
            pb::StreamStatus::NotFound
        };
        Ok(pb::StreamResponse {
            status: status as i32,
            data: Bytes::new(),
        })
    }

    async fn publish_stream(
        &self,
        _request: pb::StreamRequest,
    ) -> Result<pb::StreamResponse, Status> {
        Ok(pb::StreamResponse {
            status: pb::StreamStatus::PermissionDenied as i32,
            data: Bytes::new(),
        })
    }

    async fn run_stream(
        &self,
        _request: pb::StreamRequest,
    ) -> Result<WireStream<pb::StreamPacket>, Status> {
        let packets = futures::stream::iter((1..=3).map(|n| {
            Ok(pb::StreamPacket {
                data: Bytes::from(format!("{{\"n\":{n}}}")),
            })
        }));
        Ok(Box::pin(packets))
    }

    async fn list_endpoints(
        &self,
        _request: pb::ListEndpointsRequest,
    ) -> Result<pb::ListEndpointsResponse, Status> {
        if self.no_partition_api {
            return Err(Status::unimplemented("ListEndpoints"));
        }
        Ok(pb::ListEndpointsResponse {
            endpoints: self
                .endpoints
                .iter()
                .map(|(id, address)| pb::PartitionEndpoint {
                    id: id.clone(),
                    address: address.clone(),
                })
                .collect(),
        })
    }
}
