//! Plugin Capability Contract
//!
//! This module defines the [`Client`] trait every transport and every
//! middleware implements, the sender traits used by the streaming
//! operations, and the handler traits an in-process plugin implements.
//!
//! # Capability-Based Design
//!
//! Operations come in three shapes:
//!
//! - **Unary**: `query_data`, `check_health`, `collect_metrics`,
//!   `subscribe_stream`, `publish_stream`
//! - **Server-streamed**: `call_resource` pushes zero or more chunks into a
//!   [`CallResourceResponseSender`] before returning
//! - **Long-lived**: `run_stream` pushes packets into a [`StreamSender`]
//!   until the call is cancelled or the plugin ends the stream
//!
//! An in-process plugin is a [`BackendPlugin`] assembled from optional
//! handlers. A missing handler means the capability is not implemented.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::context::CallContext;
use super::isolation::PluginError;
use super::models::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResult,
    CollectMetricsRequest, CollectMetricsResult, PublishStreamRequest, PublishStreamResponse,
    QueryDataRequest, QueryDataResponse, RunStreamRequest, StreamPacket, SubscribeStreamRequest,
    SubscribeStreamResponse,
};

/// Receives resource response chunks as they arrive
#[async_trait]
pub trait CallResourceResponseSender: Send + Sync {
    async fn send(&self, response: CallResourceResponse) -> Result<(), PluginError>;
}

/// Receives stream packets for the lifetime of a `run_stream` call
#[async_trait]
pub trait StreamSender: Send + Sync {
    async fn send(&self, packet: StreamPacket) -> Result<(), PluginError>;
}

#[async_trait]
impl CallResourceResponseSender for mpsc::Sender<CallResourceResponse> {
    async fn send(&self, response: CallResourceResponse) -> Result<(), PluginError> {
        mpsc::Sender::send(self, response)
            .await
            .map_err(|_| PluginError::SenderClosed)
    }
}

#[async_trait]
impl StreamSender for mpsc::Sender<StreamPacket> {
    async fn send(&self, packet: StreamPacket) -> Result<(), PluginError> {
        mpsc::Sender::send(self, packet)
            .await
            .map_err(|_| PluginError::SenderClosed)
    }
}

/// The uniform contract exposed to the rest of the application.
///
/// Implemented by the three transports and by every middleware. A
/// middleware that has nothing to do for an operation must still forward
/// it unchanged to the next client.
#[async_trait]
pub trait Client: Send + Sync {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError>;

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError>;

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError>;

    /// Stream a resource response into `sender`. The sender may be invoked
    /// any number of times, including zero.
    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError>;

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError>;

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError>;

    /// Push packets into `sender` until cancellation, plugin-side
    /// termination, or error.
    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError>;
}

/// In-process `QueryData` capability
#[async_trait]
pub trait QueryDataHandler: Send + Sync {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError>;
}

/// In-process `CheckHealth` capability
#[async_trait]
pub trait CheckHealthHandler: Send + Sync {
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError>;
}

/// In-process `CollectMetrics` capability
#[async_trait]
pub trait CollectMetricsHandler: Send + Sync {
    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError>;
}

/// In-process `CallResource` capability
#[async_trait]
pub trait CallResourceHandler: Send + Sync {
    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError>;
}

/// In-process streaming capability (subscribe, publish and run)
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError>;

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError>;

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError>;
}

/// A loaded in-process plugin: a set of optional capability handlers
///
/// # Example
///
/// ```ignore
/// let plugin = Arc::new(MyDatasource::default());
/// let backend = BackendPlugin::new()
///     .with_query_data(plugin.clone())
///     .with_check_health(plugin);
/// ```
#[derive(Clone, Default)]
pub struct BackendPlugin {
    pub(crate) query_data: Option<Arc<dyn QueryDataHandler>>,
    pub(crate) check_health: Option<Arc<dyn CheckHealthHandler>>,
    pub(crate) collect_metrics: Option<Arc<dyn CollectMetricsHandler>>,
    pub(crate) call_resource: Option<Arc<dyn CallResourceHandler>>,
    pub(crate) stream: Option<Arc<dyn StreamHandler>>,
}

impl BackendPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_data(mut self, handler: Arc<dyn QueryDataHandler>) -> Self {
        self.query_data = Some(handler);
        self
    }

    pub fn with_check_health(mut self, handler: Arc<dyn CheckHealthHandler>) -> Self {
        self.check_health = Some(handler);
        self
    }

    pub fn with_collect_metrics(mut self, handler: Arc<dyn CollectMetricsHandler>) -> Self {
        self.collect_metrics = Some(handler);
        self
    }

    pub fn with_call_resource(mut self, handler: Arc<dyn CallResourceHandler>) -> Self {
        self.call_resource = Some(handler);
        self
    }

    pub fn with_stream(mut self, handler: Arc<dyn StreamHandler>) -> Self {
        self.stream = Some(handler);
        self
    }

    /// Names of the capabilities this plugin implements
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut capabilities = Vec::new();
        if self.query_data.is_some() {
            capabilities.push("query_data");
        }
        if self.check_health.is_some() {
            capabilities.push("check_health");
        }
        if self.collect_metrics.is_some() {
            capabilities.push("collect_metrics");
        }
        if self.call_resource.is_some() {
            capabilities.push("call_resource");
        }
        if self.stream.is_some() {
            capabilities.push("stream");
        }
        capabilities
    }
}

impl fmt::Debug for BackendPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendPlugin")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
