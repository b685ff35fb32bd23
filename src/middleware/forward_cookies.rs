//! Cookie forwarding
//!
//! Forwards the cookies of the inbound web request to the plugin, limited to
//! the names the datasource lists in `keepCookies` and never including the
//! globally skipped names (the host's own session cookies).
//!
//! The call passes through untouched when it has no inbound request, no
//! inbound cookies, no datasource, or a datasource with an empty keep list.
//! Otherwise the outgoing `Cookie` header is replaced by the filtered value
//! and the downstream call sees an inbound view with the same filtering
//! applied, so running the middleware twice yields the same headers.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderValue;
use http::header::COOKIE;

use super::Middleware;
use super::headers::ForwardHeaders;
use crate::plugin::capabilities::{CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::{CallContext, InboundRequest};
use crate::plugin::isolation::PluginError;
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, SubscribeStreamRequest, SubscribeStreamResponse,
};

const COOKIE_HEADER: &str = "Cookie";

#[derive(Debug, Clone)]
pub struct ForwardCookiesMiddleware {
    skip: Arc<HashSet<String>>,
}

impl ForwardCookiesMiddleware {
    pub fn new(skip_cookie_names: Vec<String>) -> Self {
        Self {
            skip: Arc::new(skip_cookie_names.into_iter().collect()),
        }
    }
}

impl Middleware for ForwardCookiesMiddleware {
    fn name(&self) -> &'static str {
        "forward_cookies"
    }

    fn wrap(&self, next: Arc<dyn Client>) -> Arc<dyn Client> {
        Arc::new(ForwardCookiesClient {
            skip: self.skip.clone(),
            next,
        })
    }
}

/// Keep the `name=value` pairs of `cookie_header` whose name is allowed
pub fn filter_cookies(cookie_header: &str, keep: &[String], skip: &HashSet<String>) -> String {
    cookie_header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let name = pair.split_once('=').map_or(*pair, |(name, _)| name).trim();
            keep.iter().any(|k| k == name) && !skip.contains(name)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

struct ForwardCookiesClient {
    skip: Arc<HashSet<String>>,
    next: Arc<dyn Client>,
}

impl ForwardCookiesClient {
    /// Rewrite the outgoing cookie header. Returns the context the next
    /// client should see when one had to be derived.
    fn forward<R: ForwardHeaders>(&self, ctx: &CallContext, mut req: R) -> (R, Option<CallContext>) {
        let Some(inbound) = ctx.inbound() else {
            return (req, None);
        };
        let Some(cookies) = inbound.cookie_header() else {
            return (req, None);
        };
        let keep = match &req.plugin_context().datasource {
            Some(datasource) => datasource.keep_cookies(),
            None => return (req, None),
        };
        if keep.is_empty() {
            return (req, None);
        }

        let filtered = filter_cookies(&cookies, &keep, &self.skip);
        let mut headers = inbound.headers.clone();
        headers.remove(COOKIE);

        if filtered.is_empty() {
            req.remove_header(COOKIE_HEADER);
        } else {
            match HeaderValue::from_str(&filtered) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Filtered cookie header is not a valid header value");
                }
            }
            req.set_header(COOKIE_HEADER, filtered);
        }

        tracing::debug!(
            plugin_id = %req.plugin_context().plugin_id,
            kept = keep.len(),
            "Forwarding inbound cookies"
        );
        (req, Some(ctx.clone().with_inbound(InboundRequest::new(headers))))
    }
}

#[async_trait]
impl Client for ForwardCookiesClient {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        let (req, scoped) = self.forward(ctx, req);
        self.next
            .query_data(scoped.as_ref().unwrap_or(ctx), req)
            .await
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        let (req, scoped) = self.forward(ctx, req);
        self.next
            .check_health(scoped.as_ref().unwrap_or(ctx), req)
            .await
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
        let (req, scoped) = self.forward(ctx, req);
        self.next
            .call_resource(scoped.as_ref().unwrap_or(ctx), req, sender)
            .await
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
