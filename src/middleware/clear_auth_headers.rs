//! Strips the host application's own credentials from outgoing requests

use std::sync::Arc;

use async_trait::async_trait;

use super::Middleware;
use super::headers::ForwardHeaders;
use crate::plugin::capabilities::{CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::CallContext;
use crate::plugin::isolation::PluginError;
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, SubscribeStreamRequest, SubscribeStreamResponse,
};

/// Removes the configured auth headers from every request that carries
/// headers. Runs before any middleware that attaches credentials.
#[derive(Debug, Clone)]
pub struct ClearAuthHeadersMiddleware {
    headers: Arc<[String]>,
}

impl ClearAuthHeadersMiddleware {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers: headers.into(),
        }
    }
}

impl Middleware for ClearAuthHeadersMiddleware {
    fn name(&self) -> &'static str {
        "clear_auth_headers"
    }

    fn wrap(&self, next: Arc<dyn Client>) -> Arc<dyn Client> {
        Arc::new(ClearAuthHeadersClient {
            headers: self.headers.clone(),
            next,
        })
    }
}

struct ClearAuthHeadersClient {
    headers: Arc<[String]>,
    next: Arc<dyn Client>,
}

impl ClearAuthHeadersClient {
    fn clear<R: ForwardHeaders>(&self, mut req: R) -> R {
        for name in self.headers.iter() {
            req.remove_header(name);
        }
        req
    }
}

#[async_trait]
impl Client for ClearAuthHeadersClient {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        self.next.query_data(ctx, self.clear(req)).await
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        self.next.check_health(ctx, self.clear(req)).await
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        self.next.collect_metrics(ctx, req).await
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        self.next.call_resource(ctx, self.clear(req), sender).await
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        self.next.subscribe_stream(ctx, req).await
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        self.next.publish_stream(ctx, req).await
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        self.next.run_stream(ctx, req, sender).await
    }
}
