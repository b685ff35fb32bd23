//! Backend Plugin Client
//!
//! This module provides the uniform client contract used to talk to backend
//! plugins, whatever way they are hosted:
//! - In-process plugins compiled into the host
//! - Out-of-process plugins reached over gRPC
//! - Partitioned plugins whose queries fan out over many endpoints
//!
//! # Architecture
//!
//! Callers obtain an `Arc<dyn Client>` from the [`ClientProvider`]. The
//! provider looks the plugin up in the [`PluginRegistry`], takes the live
//! [`Transport`] of its [`PluginInstance`] and wraps it in the middleware
//! pipeline.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ ClientProvider::client(id)                                       │
//! │   PluginRegistry ──▶ PluginInstance (Created/Started/Exited)     │
//! │                          └──▶ Transport (Local | Remote | Fanout)│
//! │   Pipeline: Logger ▶ ClearAuthHeaders ▶ OAuthToken ▶ Cookies ▶ ..│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ## Registering an In-process Plugin
//!
//! ```ignore
//! use backend_plugin_client::plugin::prelude::*;
//!
//! struct TestData;
//!
//! #[async_trait]
//! impl QueryDataHandler for TestData {
//!     async fn query_data(
//!         &self,
//!         ctx: &CallContext,
//!         req: QueryDataRequest,
//!     ) -> Result<QueryDataResponse, PluginError> {
//!         Ok(QueryDataResponse::new())
//!     }
//! }
//!
//! registry.register_local("testdata", BackendPlugin::new().with_query_data(Arc::new(TestData)))?;
//! ```
//!
//! ## Calling a Plugin
//!
//! ```ignore
//! let client = provider.client("testdata").await?;
//! let response = client.query_data(&CallContext::new(), request).await?;
//! ```

pub mod capabilities;
pub mod context;
pub mod dispatch;
pub mod frame;
pub mod isolation;
pub mod lifecycle;
pub mod models;
pub mod provider;
pub mod registry;

// Re-exports for convenience
pub use capabilities::{
    BackendPlugin, CallResourceHandler, CallResourceResponseSender, CheckHealthHandler, Client,
    CollectMetricsHandler, QueryDataHandler, StreamHandler, StreamSender,
};
pub use context::{
    CallContext, DataSourceInstanceSettings, InboundRequest, PluginContext, SignedInUser,
};
pub use dispatch::Transport;
pub use frame::{Field, FieldConfig, Frame, FrameMergeError, FrameMeta};
pub use isolation::{PluginError, call_plugin_safely};
pub use lifecycle::{Connector, PluginInstance, PluginState, TransportKind};
pub use models::*;
pub use provider::ClientProvider;
pub use registry::PluginRegistry;

/// Prelude module for convenient imports
///
/// Use this for plugin development:
/// ```ignore
/// use backend_plugin_client::plugin::prelude::*;
/// ```
pub mod prelude {
    pub use super::capabilities::{
        BackendPlugin, CallResourceHandler, CallResourceResponseSender, CheckHealthHandler,
        Client, CollectMetricsHandler, QueryDataHandler, StreamHandler, StreamSender,
    };
    pub use super::context::{CallContext, PluginContext};
    pub use super::frame::{Field, Frame};
    pub use super::isolation::PluginError;
    pub use super::models::*;
    pub use super::registry::PluginRegistry;

    // Re-export commonly needed external crates
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
