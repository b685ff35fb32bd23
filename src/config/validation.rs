//! Configuration validation logic

use std::collections::HashSet;

use crate::utils::validate_plugin_endpoint;

use super::{ClientConfig, ConfigError};

/// Validate the merged configuration: unique non-empty plugin ids and
/// acceptable endpoints.
///
/// Ids are compared case-insensitively, the way the registry keys them.
pub(super) fn validate(config: &ClientConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for plugin in &config.plugins {
        if plugin.id.trim().is_empty() {
            return Err(ConfigError::EmptyPluginId);
        }
        if !seen.insert(plugin.id.to_lowercase()) {
            return Err(ConfigError::DuplicatePluginId(plugin.id.clone()));
        }
        validate_plugin_endpoint(
            plugin.transport.endpoint(),
            config.remote.allow_insecure_public,
        )
        .map_err(|source| ConfigError::InvalidEndpoint {
            plugin_id: plugin.id.clone(),
            source,
        })?;
    }
    Ok(())
}
