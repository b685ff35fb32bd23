//! Remote (out-of-process) transport over gRPC
//!
//! # Architecture
//!
//! ```text
//! RemoteTransport ──> PluginStub ──> GrpcStub ──> tonic Channel ──> plugin process
//!      │                   ▲
//!      └── convert ────────┘  (contract models <-> pluginv2 messages)
//! ```
//!
//! A remote `Unimplemented` status is surfaced as the
//! [`PluginError::NotImplemented`] sentinel, except for health checks and
//! metrics which degrade to "unknown" and "empty".

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::plugin::dispatch::Transport;
use crate::plugin::isolation::PluginError;
use crate::plugin::lifecycle::{Connector, TransportKind};

mod client;
mod convert;
pub mod messages;
mod stub;

pub use client::RemoteTransport;
pub use convert::plugin_context_from_wire;
pub use stub::{GrpcStub, PluginStub, WireStream, connect_channel};

pub(crate) use convert::query_data_request_to_wire;

/// Connects to a plugin process listening on a gRPC endpoint
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    endpoint: String,
    config: RemoteConfig,
}

impl GrpcConnector {
    pub fn new(endpoint: impl Into<String>, config: RemoteConfig) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.into(),
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Remote
    }

    async fn connect(&self, plugin_id: &str) -> Result<Transport, PluginError> {
        let channel = connect_channel(&self.endpoint, &self.config).await?;
        Ok(Transport::Remote(RemoteTransport::new(
            plugin_id,
            Arc::new(GrpcStub::new(channel)),
        )))
    }
}
