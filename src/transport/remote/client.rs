use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::plugin::capabilities::{CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::CallContext;
use crate::plugin::isolation::PluginError;
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, StreamPacket, SubscribeStreamRequest,
    SubscribeStreamResponse,
};
use crate::transport::cancellable;

use super::convert;
use super::stub::PluginStub;

/// Transport for a plugin running in its own process.
///
/// Holds one stub (one connection) for the plugin's lifetime; every call
/// reuses it.
#[derive(Clone)]
pub struct RemoteTransport {
    plugin_id: String,
    stub: Arc<dyn PluginStub>,
}

impl RemoteTransport {
    pub fn new(plugin_id: impl Into<String>, stub: Arc<dyn PluginStub>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            stub,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub(crate) fn stub(&self) -> &Arc<dyn PluginStub> {
        &self.stub
    }
}

impl fmt::Debug for RemoteTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTransport")
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Client for RemoteTransport {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        let wire = convert::query_data_request_to_wire(&req)?;
        let response = cancellable(ctx, async {
            self.stub.query_data(wire).await.map_err(PluginError::from)
        })
        .await?;

        let mut response = convert::query_data_response_from_wire(response)?;
        response.annotate(&req.queries);
        Ok(response)
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        let wire = convert::check_health_request_to_wire(&req)?;
        let result = cancellable(ctx, async {
            self.stub.check_health(wire).await.map_err(PluginError::from)
        })
        .await;

        match result {
            Ok(response) => convert::check_health_result_from_wire(response),
            Err(err) if err.is_not_implemented() => {
                debug!(plugin_id = %self.plugin_id, "Plugin has no health check");
                Ok(CheckHealthResult::unsupported())
            }
            Err(err) => Err(err),
        }
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        let wire = convert::collect_metrics_request_to_wire(&req)?;
        let result = cancellable(ctx, async {
            self.stub.collect_metrics(wire).await.map_err(PluginError::from)
        })
        .await;

        match result {
            Ok(response) => Ok(convert::collect_metrics_result_from_wire(response)),
            Err(err) if err.is_not_implemented() => Ok(CollectMetricsResult::default()),
            Err(err) => Err(err),
        }
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        let wire = convert::call_resource_request_to_wire(req)?;
        let mut stream = cancellable(ctx, async {
            self.stub.call_resource(wire).await.map_err(PluginError::from)
        })
        .await?;

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(PluginError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    sender
                        .send(convert::call_resource_response_from_wire(chunk)?)
                        .await?
                }
                Some(Err(status)) => return Err(PluginError::from(status)),
                None => return Ok(()),
            }
        }
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        let wire = convert::subscribe_stream_request_to_wire(req)?;
        let response = cancellable(ctx, async {
            self.stub.subscribe_stream(wire).await.map_err(PluginError::from)
        })
        .await?;
        Ok(convert::subscribe_stream_response_from_wire(response))
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        let wire = convert::publish_stream_request_to_wire(req)?;
        let response = cancellable(ctx, async {
            self.stub.publish_stream(wire).await.map_err(PluginError::from)
        })
        .await?;
        Ok(convert::publish_stream_response_from_wire(response))
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        let path = req.path.clone();
        let wire = convert::run_stream_request_to_wire(req)?;
        let mut stream = match cancellable(ctx, async {
            self.stub.run_stream(wire).await.map_err(PluginError::from)
        })
        .await
        {
            Ok(stream) => stream,
            Err(err) if err.is_cancelled() => return Ok(()),
            Err(err) => return Err(err),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    debug!(plugin_id = %self.plugin_id, path = %path, "Stream cancelled by caller");
                    return Ok(());
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(packet)) => sender.send(StreamPacket { data: packet.data }).await?,
                Some(Err(status)) => {
                    let err = PluginError::from(status);
                    if err.is_cancelled() {
                        return Ok(());
                    }
                    return Err(err);
                }
                None => {
                    debug!(plugin_id = %self.plugin_id, path = %path, "Plugin ended stream");
                    return Ok(());
                }
            }
        }
    }
}
