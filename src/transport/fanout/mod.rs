//! Partitioned (fan-out) transport
//!
//! A partitioned plugin spreads its data over several endpoints. For
//! `QueryData` the transport:
//!
//! 1. asks the [`PartitionDirectory`] which endpoints serve the request
//! 2. sends the full request to every endpoint concurrently, one worker each
//! 3. collects results as workers finish, skipping failed partitions
//! 4. merges results by ref-ID and frame name ([`merge_partitions`])
//!
//! When every partition answers "not implemented" the call fails with
//! [`PluginError::NotImplemented`]; one such partition among working ones is
//! skipped like any other failure.
//!
//! Every other operation goes to the plugin's control endpoint.
//!
//! ```text
//!                     ┌──> partition p0 ──┐
//! QueryData ──> list ─┼──> partition p1 ──┼──> merge ──> response
//!                     └──> partition p2 ──┘
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::plugin::capabilities::{CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::CallContext;
use crate::plugin::dispatch::Transport;
use crate::plugin::isolation::PluginError;
use crate::plugin::lifecycle::{Connector, TransportKind};
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, DataResponse, PublishStreamRequest, PublishStreamResponse,
    QueryDataRequest, QueryDataResponse, RunStreamRequest, SubscribeStreamRequest,
    SubscribeStreamResponse,
};
use crate::transport::remote::{GrpcStub, RemoteTransport, connect_channel};

mod directory;
mod merge;

pub use directory::{GrpcPartitionDirectory, PartitionDirectory, PartitionEndpoint};
pub use merge::merge_partitions;

type PartitionResults = Arc<Mutex<Vec<(String, DataResponse)>>>;

/// Transport for a partitioned plugin
pub struct FanoutTransport {
    plugin_id: String,
    control: Arc<dyn Client>,
    directory: Arc<dyn PartitionDirectory>,
}

impl FanoutTransport {
    pub fn new(
        plugin_id: impl Into<String>,
        control: Arc<dyn Client>,
        directory: Arc<dyn PartitionDirectory>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            control,
            directory,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

impl fmt::Debug for FanoutTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutTransport")
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}

/// Query one partition; runs inside a worker task
async fn query_partition(
    directory: Arc<dyn PartitionDirectory>,
    ctx: CallContext,
    endpoint: PartitionEndpoint,
    req: QueryDataRequest,
) -> Result<QueryDataResponse, PluginError> {
    let client = directory.client(&endpoint).await?;
    client.query_data(&ctx, req).await
}

#[async_trait]
impl Client for FanoutTransport {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        let endpoints = self.directory.endpoints(ctx, &req).await?;
        if endpoints.is_empty() {
            debug!(plugin_id = %self.plugin_id, "No partitions serve this request");
            return Ok(QueryDataResponse::new());
        }

        let results: PartitionResults = Arc::new(Mutex::new(Vec::new()));
        let partitions = endpoints.len();
        let mut workers = JoinSet::new();

        for endpoint in endpoints {
            let directory = self.directory.clone();
            let results = results.clone();
            let worker_ctx = ctx.child();
            let request = req.clone();
            let plugin_id = self.plugin_id.clone();

            workers.spawn(async move {
                let label = endpoint.to_string();
                let outcome = tokio::select! {
                    biased;
                    _ = worker_ctx.cancelled() => Err(PluginError::Cancelled),
                    result = query_partition(directory, worker_ctx.clone(), endpoint, request) => result,
                };

                match outcome {
                    Ok(response) => {
                        let mut results = results.lock();
                        results.extend(response.responses);
                        false
                    }
                    Err(e) if e.is_cancelled() => {
                        debug!(plugin_id = %plugin_id, endpoint = %label, "Partition query cancelled");
                        false
                    }
                    Err(e) if e.is_not_implemented() => {
                        debug!(plugin_id = %plugin_id, endpoint = %label, "Partition does not serve queries");
                        true
                    }
                    Err(e) => {
                        warn!(
                            plugin_id = %plugin_id,
                            endpoint = %label,
                            error = %e,
                            "Partition query failed, skipping its results"
                        );
                        false
                    }
                }
            });
        }

        let mut unimplemented = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    workers.abort_all();
                    return Err(PluginError::Cancelled);
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(true)) => unimplemented += 1,
                    Some(Ok(false)) => {}
                    Some(Err(e)) => {
                        warn!(plugin_id = %self.plugin_id, error = %e, "Partition worker failed");
                    }
                    None => break,
                },
            }
        }

        if unimplemented == partitions {
            return Err(PluginError::NotImplemented);
        }

        let collected = std::mem::take(&mut *results.lock());
        debug!(
            plugin_id = %self.plugin_id,
            results = collected.len(),
            "Merging partition results"
        );
        let mut merged = merge_partitions(&self.plugin_id, collected);
        merged.annotate(&req.queries);
        Ok(merged)
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        self.control.check_health(ctx, req).await
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        self.control.collect_metrics(ctx, req).await
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        self.control.call_resource(ctx, req, sender).await
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        self.control.subscribe_stream(ctx, req).await
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        self.control.publish_stream(ctx, req).await
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        self.control.run_stream(ctx, req, sender).await
    }
}

/// Connects to a partitioned plugin's control endpoint
#[derive(Debug, Clone)]
pub struct PartitionedConnector {
    control_endpoint: String,
    config: RemoteConfig,
}

impl PartitionedConnector {
    pub fn new(control_endpoint: impl Into<String>, config: RemoteConfig) -> Arc<Self> {
        Arc::new(Self {
            control_endpoint: control_endpoint.into(),
            config,
        })
    }
}

#[async_trait]
impl Connector for PartitionedConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Partitioned
    }

    async fn connect(&self, plugin_id: &str) -> Result<Transport, PluginError> {
        let channel = connect_channel(&self.control_endpoint, &self.config).await?;
        let control = RemoteTransport::new(plugin_id, Arc::new(GrpcStub::new(channel)));
        let directory = GrpcPartitionDirectory::new(
            plugin_id,
            control.stub().clone(),
            self.config.clone(),
        );
        Ok(Transport::Fanout(FanoutTransport::new(
            plugin_id,
            Arc::new(control),
            Arc::new(directory),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::capabilities::{BackendPlugin, QueryDataHandler};
    use crate::plugin::context::PluginContext;
    use crate::plugin::frame::{Field, Frame};
    use crate::plugin::models::DataQuery;
    use crate::transport::local::LocalTransport;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Shard {
        value: i64,
        delay: Duration,
    }

    #[async_trait]
    impl QueryDataHandler for Shard {
        async fn query_data(
            &self,
            _ctx: &CallContext,
            req: QueryDataRequest,
        ) -> Result<QueryDataResponse, PluginError> {
            tokio::time::sleep(self.delay).await;
            let mut response = QueryDataResponse::new();
            for query in req.queries {
                let frame = Frame::new("series")
                    .with_field(Field::new("value", vec![json!(self.value)]));
                response.insert(query.ref_id, DataResponse::from_frames(vec![frame]));
            }
            Ok(response)
        }
    }

    struct StaticDirectory {
        clients: HashMap<String, Arc<dyn Client>>,
    }

    #[async_trait]
    impl PartitionDirectory for StaticDirectory {
        async fn endpoints(
            &self,
            _ctx: &CallContext,
            _req: &QueryDataRequest,
        ) -> Result<Vec<PartitionEndpoint>, PluginError> {
            let mut ids: Vec<&String> = self.clients.keys().collect();
            ids.sort();
            Ok(ids
                .into_iter()
                .map(|id| PartitionEndpoint::new(id.clone(), format!("mem://{id}")))
                .collect())
        }

        async fn client(
            &self,
            endpoint: &PartitionEndpoint,
        ) -> Result<Arc<dyn Client>, PluginError> {
            self.clients
                .get(&endpoint.id)
                .cloned()
                .ok_or_else(|| PluginError::Connection(format!("no route to {endpoint}")))
        }
    }

    fn shard(value: i64, delay_ms: u64) -> Arc<dyn Client> {
        let plugin = BackendPlugin::new().with_query_data(Arc::new(Shard {
            value,
            delay: Duration::from_millis(delay_ms),
        }));
        Arc::new(LocalTransport::new("sharded", plugin))
    }

    fn fanout(clients: Vec<(&str, Arc<dyn Client>)>) -> FanoutTransport {
        let directory = StaticDirectory {
            clients: clients
                .into_iter()
                .map(|(id, client)| (id.to_string(), client))
                .collect(),
        };
        FanoutTransport::new(
            "sharded",
            Arc::new(LocalTransport::new("sharded", BackendPlugin::new())),
            Arc::new(directory),
        )
    }

    fn request() -> QueryDataRequest {
        QueryDataRequest::new(
            PluginContext::new(1, "sharded"),
            vec![DataQuery::new("A", json!({"expr": "series"}))],
        )
    }

    #[tokio::test]
    async fn test_results_of_all_partitions_are_merged() {
        let transport = fanout(vec![("p0", shard(1, 0)), ("p1", shard(2, 10)), ("p2", shard(3, 5))]);
        let response = transport
            .query_data(&CallContext::new(), request())
            .await
            .unwrap();

        let frames = &response.get("A").unwrap().frames;
        assert_eq!(frames.len(), 1);
        let mut values: Vec<i64> = frames[0].fields[0]
            .values
            .iter()
            .filter_map(|v| v.as_i64())
            .collect();
        values.sort();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(frames[0].executed_query_string(), Some("series"));
    }

    #[tokio::test]
    async fn test_unreachable_partition_is_skipped() {
        let mut transport = fanout(vec![("p0", shard(1, 0))]);
        transport.directory = Arc::new(FlakyDirectory {
            inner: StaticDirectory {
                clients: HashMap::from([("p0".to_string(), shard(1, 0))]),
            },
        });
        let response = transport
            .query_data(&CallContext::new(), request())
            .await
            .unwrap();
        assert_eq!(response.get("A").unwrap().frames[0].rows(), 1);
    }

    struct FlakyDirectory {
        inner: StaticDirectory,
    }

    #[async_trait]
    impl PartitionDirectory for FlakyDirectory {
        async fn endpoints(
            &self,
            ctx: &CallContext,
            req: &QueryDataRequest,
        ) -> Result<Vec<PartitionEndpoint>, PluginError> {
            let mut endpoints = self.inner.endpoints(ctx, req).await?;
            endpoints.push(PartitionEndpoint::new("gone", "mem://gone"));
            Ok(endpoints)
        }

        async fn client(
            &self,
            endpoint: &PartitionEndpoint,
        ) -> Result<Arc<dyn Client>, PluginError> {
            self.inner.client(endpoint).await
        }
    }

    fn no_query_handler() -> Arc<dyn Client> {
        Arc::new(LocalTransport::new("sharded", BackendPlugin::new()))
    }

    #[tokio::test]
    async fn test_all_partitions_unimplemented_is_not_implemented() {
        let transport = fanout(vec![("p0", no_query_handler()), ("p1", no_query_handler())]);
        let err = transport
            .query_data(&CallContext::new(), request())
            .await
            .unwrap_err();
        assert!(err.is_not_implemented(), "{err}");
    }

    #[tokio::test]
    async fn test_unimplemented_partition_among_working_ones_is_skipped() {
        let transport = fanout(vec![("p0", shard(7, 0)), ("p1", no_query_handler())]);
        let response = transport
            .query_data(&CallContext::new(), request())
            .await
            .unwrap();
        let frames = &response.get("A").unwrap().frames;
        assert_eq!(frames[0].rows(), 1);
        assert_eq!(frames[0].fields[0].values, vec![json!(7)]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_fanout() {
        let transport = fanout(vec![("p0", shard(1, 10_000)), ("p1", shard(2, 10_000))]);
        let ctx = CallContext::new();
        let cancel = ctx.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let err = transport.query_data(&ctx, request()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_partitions_gives_empty_response() {
        let transport = fanout(vec![]);
        let response = transport
            .query_data(&CallContext::new(), request())
            .await
            .unwrap();
        assert!(response.responses.is_empty());
    }

    #[tokio::test]
    async fn test_health_goes_to_control_endpoint() {
        let transport = fanout(vec![("p0", shard(1, 0))]);
        let result = transport
            .check_health(&CallContext::new(), CheckHealthRequest::default())
            .await
            .unwrap();
        assert_eq!(result, CheckHealthResult::unsupported());
    }
}
