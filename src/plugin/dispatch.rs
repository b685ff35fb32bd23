//! Transport Dispatch
//!
//! The three transports are a closed set, so a started plugin holds a
//! [`Transport`] enum and calls are dispatched with a `match` rather than
//! through a trait object. Middleware still sees the transport as an
//! `Arc<dyn Client>`.
//!
//! ```text
//! ClientProvider → Pipeline(..middleware..) → Transport ─┬─ Local
//!                                                        ├─ Remote
//!                                                        └─ Fanout
//! ```

use async_trait::async_trait;

use super::capabilities::{CallResourceResponseSender, Client, StreamSender};
use super::context::CallContext;
use super::isolation::PluginError;
use super::lifecycle::TransportKind;
use super::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, SubscribeStreamRequest, SubscribeStreamResponse,
};
use crate::transport::fanout::FanoutTransport;
use crate::transport::local::LocalTransport;
use crate::transport::remote::RemoteTransport;

/// A live connection to one plugin
#[derive(Debug)]
pub enum Transport {
    Local(LocalTransport),
    Remote(RemoteTransport),
    Fanout(FanoutTransport),
}

impl Transport {
    #[inline]
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Local(_) => TransportKind::Local,
            Transport::Remote(_) => TransportKind::Remote,
            Transport::Fanout(_) => TransportKind::Partitioned,
        }
    }

    #[inline]
    fn client(&self) -> &dyn Client {
        match self {
            Transport::Local(transport) => transport,
            Transport::Remote(transport) => transport,
            Transport::Fanout(transport) => transport,
        }
    }
}

#[async_trait]
impl Client for Transport {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        self.client().query_data(ctx, req).await
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        self.client().check_health(ctx, req).await
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        self.client().collect_metrics(ctx, req).await
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        self.client().call_resource(ctx, req, sender).await
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        self.client().subscribe_stream(ctx, req).await
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        self.client().publish_stream(ctx, req).await
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        self.client().run_stream(ctx, req, sender).await
    }
}
