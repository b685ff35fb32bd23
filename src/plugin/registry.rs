//! Plugin Registry
//!
//! Central registry of plugin instances, keyed by plugin id. Ids are
//! matched case-insensitively.
//!
//! # Architecture
//!
//! The registry uses DashMap for concurrent lookup. Each entry is an
//! `Arc<PluginInstance>`; callers clone the `Arc` out and release the map
//! shard before doing any async work on it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = PluginRegistry::from_config(&config)?;
//! registry.register_local("testdata", backend_plugin)?;
//! registry.start_all().await;
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::capabilities::BackendPlugin;
use super::isolation::PluginError;
use super::lifecycle::{Connector, PluginInstance};
use crate::config::{ClientConfig, TransportDefinition};
use crate::transport::fanout::PartitionedConnector;
use crate::transport::local::LocalConnector;
use crate::transport::remote::GrpcConnector;

/// Registry of plugin instances
#[derive(Debug, Default)]
pub struct PluginRegistry {
    instances: DashMap<String, Arc<PluginInstance>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding every out-of-process plugin in `config`
    pub fn from_config(config: &ClientConfig) -> Result<Self, PluginError> {
        let registry = Self::new();
        for plugin in &config.plugins {
            let connector: Arc<dyn Connector> = match &plugin.transport {
                TransportDefinition::Remote { endpoint } => {
                    GrpcConnector::new(endpoint.clone(), config.remote.clone())
                }
                TransportDefinition::Partitioned { control_endpoint } => {
                    PartitionedConnector::new(control_endpoint.clone(), config.remote.clone())
                }
            };
            registry.register(&plugin.id, connector)?;
        }
        Ok(registry)
    }

    /// Register a plugin. A decommissioned instance with the same id is
    /// replaced; a live one is an error.
    pub fn register(
        &self,
        plugin_id: &str,
        connector: Arc<dyn Connector>,
    ) -> Result<Arc<PluginInstance>, PluginError> {
        let id = plugin_id.to_lowercase();
        if id.is_empty() {
            return Err(PluginError::Configuration(
                "plugin id must not be empty".to_string(),
            ));
        }

        let kind = connector.kind();
        let instance = Arc::new(PluginInstance::new(id.clone(), connector));
        match self.instances.entry(id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_decommissioned() {
                    return Err(PluginError::Configuration(format!(
                        "plugin '{}' is already registered",
                        plugin_id
                    )));
                }
                entry.insert(instance.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(instance.clone());
            }
        }

        tracing::debug!(plugin_id = %plugin_id, kind = %kind, "Registered plugin");
        Ok(instance)
    }

    /// Register a plugin compiled into the host
    pub fn register_local(
        &self,
        plugin_id: &str,
        plugin: BackendPlugin,
    ) -> Result<Arc<PluginInstance>, PluginError> {
        self.register(plugin_id, LocalConnector::new(plugin))
    }

    /// Look up a plugin; decommissioned plugins are not returned
    pub fn lookup(&self, plugin_id: &str) -> Option<Arc<PluginInstance>> {
        self.instances
            .get(&plugin_id.to_lowercase())
            .filter(|instance| !instance.is_decommissioned())
            .map(|instance| instance.clone())
    }

    /// Mark a plugin as decommissioned. Returns false for unknown ids.
    pub fn decommission(&self, plugin_id: &str) -> bool {
        match self.instances.get(&plugin_id.to_lowercase()) {
            Some(instance) => {
                instance.decommission();
                true
            }
            None => false,
        }
    }

    /// Start every registered plugin, returning the ones that failed
    pub async fn start_all(&self) -> Vec<(String, PluginError)> {
        let mut failures = Vec::new();
        for instance in self.live_instances() {
            if let Err(e) = instance.start().await {
                tracing::warn!(plugin_id = %instance.id(), error = %e, "Failed to start plugin");
                failures.push((instance.id().to_string(), e));
            }
        }
        failures
    }

    pub async fn stop_all(&self) {
        for instance in self.instances.iter().map(|entry| entry.value().clone()).collect::<Vec<_>>() {
            if let Err(e) = instance.stop().await {
                tracing::warn!(plugin_id = %instance.id(), error = %e, "Failed to stop plugin");
            }
        }
    }

    /// Ids of all plugins that are not decommissioned, sorted
    pub fn plugin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .live_instances()
            .iter()
            .map(|instance| instance.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn live_instances(&self) -> Vec<Arc<PluginInstance>> {
        self.instances
            .iter()
            .filter(|entry| !entry.value().is_decommissioned())
            .map(|entry| entry.value().clone())
            .collect()
    }
}
