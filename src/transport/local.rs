//! In-process transport
//!
//! Calls go straight to the plugin's handlers. Every call is wrapped in
//! [`call_plugin_safely`] so a panicking plugin becomes an error instead of
//! taking the host down, and raced against the context's cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::plugin::capabilities::{BackendPlugin, CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::CallContext;
use crate::plugin::dispatch::Transport;
use crate::plugin::isolation::{PluginError, call_plugin_safely};
use crate::plugin::lifecycle::{Connector, TransportKind};
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, SubscribeStreamRequest, SubscribeStreamResponse,
};

use super::cancellable;

/// Transport for a plugin compiled into the host
#[derive(Debug, Clone)]
pub struct LocalTransport {
    plugin_id: String,
    plugin: BackendPlugin,
}

impl LocalTransport {
    pub fn new(plugin_id: impl Into<String>, plugin: BackendPlugin) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

#[async_trait]
impl Client for LocalTransport {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        let Some(handler) = &self.plugin.query_data else {
            return Err(PluginError::NotImplemented);
        };
        let queries = req.queries.clone();
        let mut response =
            cancellable(ctx, call_plugin_safely(handler.query_data(ctx, req))).await?;
        response.annotate(&queries);
        Ok(response)
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        let Some(handler) = &self.plugin.check_health else {
            debug!(plugin_id = %self.plugin_id, "Plugin has no health check");
            return Ok(CheckHealthResult::unsupported());
        };
        match cancellable(ctx, call_plugin_safely(handler.check_health(ctx, req))).await {
            Err(err) if err.is_not_implemented() => Ok(CheckHealthResult::unsupported()),
            result => result,
        }
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        let Some(handler) = &self.plugin.collect_metrics else {
            return Ok(CollectMetricsResult::default());
        };
        match cancellable(ctx, call_plugin_safely(handler.collect_metrics(ctx, req))).await {
            Err(err) if err.is_not_implemented() => Ok(CollectMetricsResult::default()),
            result => result,
        }
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        let Some(handler) = &self.plugin.call_resource else {
            return Err(PluginError::NotImplemented);
        };
        cancellable(ctx, call_plugin_safely(handler.call_resource(ctx, req, sender))).await
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        let Some(handler) = &self.plugin.stream else {
            return Err(PluginError::NotImplemented);
        };
        cancellable(ctx, call_plugin_safely(handler.subscribe_stream(ctx, req))).await
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        let Some(handler) = &self.plugin.stream else {
            return Err(PluginError::NotImplemented);
        };
        cancellable(ctx, call_plugin_safely(handler.publish_stream(ctx, req))).await
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        let Some(handler) = &self.plugin.stream else {
            return Err(PluginError::NotImplemented);
        };
        let path = req.path.clone();
        match cancellable(ctx, call_plugin_safely(handler.run_stream(ctx, req, sender))).await {
            // a cancelled stream is a normal way for it to end
            Err(err) if err.is_cancelled() => {
                debug!(plugin_id = %self.plugin_id, path = %path, "Stream cancelled by caller");
                Ok(())
            }
            result => result,
        }
    }
}

/// Connector for plugins compiled into the host
#[derive(Debug, Clone)]
pub struct LocalConnector {
    plugin: BackendPlugin,
}

impl LocalConnector {
    pub fn new(plugin: BackendPlugin) -> Arc<Self> {
        Arc::new(Self { plugin })
    }
}

#[async_trait]
impl Connector for LocalConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    async fn connect(&self, plugin_id: &str) -> Result<Transport, PluginError> {
        debug!(
            plugin_id = %plugin_id,
            capabilities = ?self.plugin.capabilities(),
            "Binding in-process plugin"
        );
        Ok(Transport::Local(LocalTransport::new(
            plugin_id,
            self.plugin.clone(),
        )))
    }
}
