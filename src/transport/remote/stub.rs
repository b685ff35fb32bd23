//! RPC stub for the `pluginv2` services
//!
//! [`PluginStub`] is the seam between [`RemoteTransport`](super::RemoteTransport)
//! and the wire. [`GrpcStub`] implements it on a tonic channel using
//! tonic's low-level `Grpc` client with a prost codec, so no generated
//! service code is needed.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::info;

use crate::config::RemoteConfig;
use crate::plugin::isolation::PluginError;

use super::messages as pb;

/// Server-streamed responses of one call
pub type WireStream<T> = BoxStream<'static, Result<T, Status>>;

/// The `pluginv2` RPC surface of one plugin process
#[async_trait]
pub trait PluginStub: Send + Sync {
    async fn query_data(
        &self,
        request: pb::QueryDataRequest,
    ) -> Result<pb::QueryDataResponse, Status>;

    async fn check_health(
        &self,
        request: pb::CheckHealthRequest,
    ) -> Result<pb::CheckHealthResponse, Status>;

    async fn collect_metrics(
        &self,
        request: pb::CollectMetricsRequest,
    ) -> Result<pb::CollectMetricsResponse, Status>;

    async fn call_resource(
        &self,
        request: pb::CallResourceRequest,
    ) -> Result<WireStream<pb::CallResourceResponse>, Status>;

    async fn subscribe_stream(
        &self,
        request: pb::StreamRequest,
    ) -> Result<pb::StreamResponse, Status>;

    async fn publish_stream(&self, request: pb::StreamRequest)
    -> Result<pb::StreamResponse, Status>;

    async fn run_stream(
        &self,
        request: pb::StreamRequest,
    ) -> Result<WireStream<pb::StreamPacket>, Status>;

    /// Partition negotiation; only partitioned plugins serve it
    async fn list_endpoints(
        &self,
        _request: pb::ListEndpointsRequest,
    ) -> Result<pb::ListEndpointsResponse, Status> {
        Err(Status::unimplemented("plugin does not serve partitions"))
    }
}

/// Connect a tonic channel to a plugin endpoint
pub async fn connect_channel(endpoint: &str, config: &RemoteConfig) -> Result<Channel, PluginError> {
    let mut builder = Endpoint::from_shared(endpoint.to_string()).map_err(|e| {
        PluginError::Configuration(format!("invalid plugin endpoint '{}': {}", endpoint, e))
    })?;

    if endpoint.starts_with("https://") {
        builder = builder
            .tls_config(ClientTlsConfig::new())
            .map_err(|e| PluginError::Configuration(format!("TLS config error: {}", e)))?;
    }

    let channel = builder
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect()
        .await
        .map_err(|e| {
            PluginError::Connection(format!("gRPC connection to {} failed: {}", endpoint, e))
        })?;

    info!(endpoint = %endpoint, "Connected to plugin gRPC endpoint");
    Ok(channel)
}

/// [`PluginStub`] over a tonic channel
#[derive(Debug, Clone)]
pub struct GrpcStub {
    channel: Channel,
}

impl GrpcStub {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    async fn unary<Req, Resp>(&self, request: Req, path: &'static str) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("Plugin service not ready: {}", e)))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(Request::new(request), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }

    async fn server_streaming<Req, Resp>(
        &self,
        request: Req,
        path: &'static str,
    ) -> Result<WireStream<Resp>, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("Plugin service not ready: {}", e)))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .server_streaming(Request::new(request), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(Box::pin(response.into_inner()))
    }
}

#[async_trait]
impl PluginStub for GrpcStub {
    async fn query_data(
        &self,
        request: pb::QueryDataRequest,
    ) -> Result<pb::QueryDataResponse, Status> {
        self.unary(request, pb::QUERY_DATA_PATH).await
    }

    async fn check_health(
        &self,
        request: pb::CheckHealthRequest,
    ) -> Result<pb::CheckHealthResponse, Status> {
        self.unary(request, pb::CHECK_HEALTH_PATH).await
    }

    async fn collect_metrics(
        &self,
        request: pb::CollectMetricsRequest,
    ) -> Result<pb::CollectMetricsResponse, Status> {
        self.unary(request, pb::COLLECT_METRICS_PATH).await
    }

    async fn call_resource(
        &self,
        request: pb::CallResourceRequest,
    ) -> Result<WireStream<pb::CallResourceResponse>, Status> {
        self.server_streaming(request, pb::CALL_RESOURCE_PATH).await
    }

    async fn subscribe_stream(
        &self,
        request: pb::StreamRequest,
    ) -> Result<pb::StreamResponse, Status> {
        self.unary(request, pb::SUBSCRIBE_STREAM_PATH).await
    }

    async fn publish_stream(
        &self,
        request: pb::StreamRequest,
    ) -> Result<pb::StreamResponse, Status> {
        self.unary(request, pb::PUBLISH_STREAM_PATH).await
    }

    async fn run_stream(
        &self,
        request: pb::StreamRequest,
    ) -> Result<WireStream<pb::StreamPacket>, Status> {
        self.server_streaming(request, pb::RUN_STREAM_PATH).await
    }

    async fn list_endpoints(
        &self,
        request: pb::ListEndpointsRequest,
    ) -> Result<pb::ListEndpointsResponse, Status> {
        self.unary(request, pb::LIST_ENDPOINTS_PATH).await
    }
}
