//! Partition discovery and per-endpoint connections

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;
use crate::plugin::capabilities::Client;
use crate::plugin::context::CallContext;
use crate::plugin::isolation::PluginError;
use crate::plugin::models::QueryDataRequest;
use crate::transport::cancellable;
use crate::transport::remote::messages as pb;
use crate::transport::remote::{
    GrpcStub, PluginStub, RemoteTransport, connect_channel, query_data_request_to_wire,
};
use crate::utils::validate_plugin_endpoint;

/// One partition endpoint serving part of a plugin's data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionEndpoint {
    pub id: String,
    pub address: String,
}

impl PartitionEndpoint {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PartitionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// Source of partition endpoints and of clients to reach them
#[async_trait]
pub trait PartitionDirectory: Send + Sync {
    /// Endpoints holding data for this request
    async fn endpoints(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> Result<Vec<PartitionEndpoint>, PluginError>;

    /// Client for one endpoint
    async fn client(&self, endpoint: &PartitionEndpoint) -> Result<Arc<dyn Client>, PluginError>;
}

/// Asks the control endpoint for partitions and keeps one gRPC connection
/// per partition address.
///
/// Advertised addresses pass the same endpoint validation as configured
/// ones before a connection is made. Connections to addresses missing from
/// the latest negotiation are dropped.
pub struct GrpcPartitionDirectory {
    plugin_id: String,
    control: Arc<dyn PluginStub>,
    config: RemoteConfig,
    connections: DashMap<String, Arc<RemoteTransport>>,
}

impl GrpcPartitionDirectory {
    pub fn new(plugin_id: impl Into<String>, control: Arc<dyn PluginStub>, config: RemoteConfig) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            control,
            config,
            connections: DashMap::new(),
        }
    }

    /// Number of cached partition connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[async_trait]
impl PartitionDirectory for GrpcPartitionDirectory {
    async fn endpoints(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> Result<Vec<PartitionEndpoint>, PluginError> {
        let wire = pb::ListEndpointsRequest {
            request: Some(query_data_request_to_wire(req)?),
        };
        let response = cancellable(ctx, async {
            self.control.list_endpoints(wire).await.map_err(PluginError::from)
        })
        .await?;

        let endpoints: Vec<PartitionEndpoint> = response
            .endpoints
            .into_iter()
            .map(|endpoint| PartitionEndpoint::new(endpoint.id, endpoint.address))
            .collect();
        debug!(
            plugin_id = %self.plugin_id,
            count = endpoints.len(),
            "Resolved partition endpoints"
        );

        self.connections.retain(|address, _| {
            let advertised = endpoints.iter().any(|endpoint| &endpoint.address == address);
            if !advertised {
                debug!(plugin_id = %self.plugin_id, endpoint = %address, "Dropping stale partition connection");
            }
            advertised
        });
        Ok(endpoints)
    }

    async fn client(&self, endpoint: &PartitionEndpoint) -> Result<Arc<dyn Client>, PluginError> {
        if let Some(existing) = self.connections.get(&endpoint.address) {
            return Ok(existing.clone());
        }

        let address = endpoint.address.clone();
        let allow_insecure_public = self.config.allow_insecure_public;
        // may resolve a hostname
        tokio::task::spawn_blocking(move || validate_plugin_endpoint(&address, allow_insecure_public))
            .await
            .map_err(|e| PluginError::Configuration(format!("endpoint validation aborted: {e}")))?
            .map_err(|e| {
                warn!(plugin_id = %self.plugin_id, endpoint = %endpoint, error = %e, "Rejected partition endpoint");
                PluginError::Configuration(format!(
                    "partition endpoint '{}' rejected: {}",
                    endpoint.address, e
                ))
            })?;

        let channel = connect_channel(&endpoint.address, &self.config).await?;
        let transport = Arc::new(RemoteTransport::new(
            self.plugin_id.clone(),
            Arc::new(GrpcStub::new(channel)),
        ));
        // a concurrent worker may have connected first; keep whichever won
        let transport = self
            .connections
            .entry(endpoint.address.clone())
            .or_insert(transport)
            .clone();
        info!(plugin_id = %self.plugin_id, endpoint = %endpoint, "Connected to partition");
        Ok(transport)
    }
}

impl fmt::Debug for GrpcPartitionDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcPartitionDirectory")
            .field("plugin_id", &self.plugin_id)
            .field("connections", &self.connections.len())
            .finish()
    }
}
