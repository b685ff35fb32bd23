//! Entry point used by the rest of the application to obtain a client

use std::sync::Arc;

use super::capabilities::Client;
use super::isolation::PluginError;
use super::registry::PluginRegistry;
use crate::middleware::Pipeline;

/// Hands out pipeline-wrapped clients for registered, started plugins
#[derive(Clone)]
pub struct ClientProvider {
    registry: Arc<PluginRegistry>,
    pipeline: Pipeline,
}

impl ClientProvider {
    pub fn new(registry: Arc<PluginRegistry>, pipeline: Pipeline) -> Self {
        Self { registry, pipeline }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// A client for `plugin_id`, wrapped in the middleware pipeline.
    ///
    /// Fails with [`PluginError::NotRegistered`] for unknown or
    /// decommissioned plugins and [`PluginError::Unavailable`] for plugins
    /// that are not started.
    pub async fn client(&self, plugin_id: &str) -> Result<Arc<dyn Client>, PluginError> {
        let instance = self
            .registry
            .lookup(plugin_id)
            .ok_or_else(|| PluginError::NotRegistered(plugin_id.to_string()))?;

        let transport = instance.transport().await.ok_or_else(|| {
            tracing::debug!(plugin_id = %plugin_id, "Plugin is registered but not started");
            PluginError::Unavailable(plugin_id.to_string())
        })?;

        Ok(self.pipeline.wrap(transport))
    }
}
