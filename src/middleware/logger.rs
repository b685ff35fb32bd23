//! Per-call logging
//!
//! Emits one event per contract call with the method, plugin id, elapsed
//! time and an outcome label.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::Middleware;
use crate::plugin::capabilities::{CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::CallContext;
use crate::plugin::isolation::PluginError;
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, SubscribeStreamRequest, SubscribeStreamResponse,
};

/// Logs every call passing through the pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn wrap(&self, next: Arc<dyn Client>) -> Arc<dyn Client> {
        Arc::new(LoggingClient { next })
    }
}

struct LoggingClient {
    next: Arc<dyn Client>,
}

/// Outcome label recorded for a finished call
pub fn call_status<T>(result: &Result<T, PluginError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(PluginError::Cancelled) => "cancelled",
        Err(PluginError::NotImplemented) => "not_implemented",
        Err(_) => "error",
    }
}

fn log_call<T>(
    method: &'static str,
    plugin_id: &str,
    ctx: &CallContext,
    started: Instant,
    result: &Result<T, PluginError>,
) {
    let status = call_status(result);
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Err(e) if status == "error" => {
            tracing::warn!(
                method,
                plugin_id = %plugin_id,
                request_id = %ctx.request_id(),
                duration_ms,
                status,
                error = %e,
                "Plugin request failed"
            );
        }
        _ => {
            tracing::info!(
                method,
                plugin_id = %plugin_id,
                request_id = %ctx.request_id(),
                duration_ms,
                status,
                "Plugin request completed"
            );
        }
    }
}

#[async_trait]
impl Client for LoggingClient {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        let started = Instant::now();
        let result = self.next.query_data(ctx, req).await;
        log_call("query_data", &plugin_id, ctx, started, &result);
        result
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        let started = Instant::now();
        let result = self.next.check_health(ctx, req).await;
        log_call("check_health", &plugin_id, ctx, started, &result);
        result
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        let started = Instant::now();
        let result = self.next.collect_metrics(ctx, req).await;
        log_call("collect_metrics", &plugin_id, ctx, started, &result);
        result
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        tracing::debug!(
            plugin_id = %plugin_id,
            method = %req.method,
            path = %req.path,
            "Calling plugin resource"
        );
        let started = Instant::now();
        let result = self.next.call_resource(ctx, req, sender).await;
        log_call("call_resource", &plugin_id, ctx, started, &result);
        result
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        let started = Instant::now();
        let result = self.next.subscribe_stream(ctx, req).await;
        log_call("subscribe_stream", &plugin_id, ctx, started, &result);
        result
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        let started = Instant::now();
        let result = self.next.publish_stream(ctx, req).await;
        log_call("publish_stream", &plugin_id, ctx, started, &result);
        result
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        let plugin_id = req.plugin_context.plugin_id.clone();
        let started = Instant::now();
        let result = self.next.run_stream(ctx, req, sender).await;
        log_call("run_stream", &plugin_id, ctx, started, &result);
        result
    }
}
