//! Configuration module for the plugin client
//!
//! Handles configuration from .env files, environment variables and YAML
//! files. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file schema and loading
//! - `env`: Environment variable loading
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use backend_plugin_client::config::ClientConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ClientConfig::from_file(Path::new("plugins.yaml"))?;
//! println!("{} plugins configured", config.plugins.len());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

mod env;
mod validation;
mod yaml;

pub use yaml::{MiddlewareYaml, PluginYaml, RemoteYaml, TransportYaml, YamlConfig};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    #[error("plugin id must not be empty")]
    EmptyPluginId,

    #[error("duplicate plugin id: {0}")]
    DuplicatePluginId(String),

    #[error("invalid endpoint for plugin {plugin_id}: {source}")]
    InvalidEndpoint {
        plugin_id: String,
        #[source]
        source: crate::utils::UrlValidationError,
    },
}

/// Settings shared by every gRPC connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Permit plaintext connections to public addresses
    pub allow_insecure_public: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            allow_insecure_public: false,
        }
    }
}

/// Settings of the standard middleware pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareConfig {
    /// Headers removed from every outgoing request
    pub auth_headers: Vec<String>,
    /// Cookies never forwarded, whatever a datasource allows
    pub skip_cookie_names: Vec<String>,
    pub token_expiry_skew_secs: u64,
}

impl MiddlewareConfig {
    pub fn token_expiry_skew(&self) -> Duration {
        Duration::from_secs(self.token_expiry_skew_secs)
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            auth_headers: vec![
                "Authorization".to_string(),
                "X-Id-Token".to_string(),
                "X-Api-Key".to_string(),
            ],
            skip_cookie_names: vec!["app_session".to_string(), "app_session_expiry".to_string()],
            token_expiry_skew_secs: 10,
        }
    }
}

/// How a configured plugin is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportDefinition {
    Remote { endpoint: String },
    Partitioned { control_endpoint: String },
}

impl TransportDefinition {
    pub fn endpoint(&self) -> &str {
        match self {
            TransportDefinition::Remote { endpoint } => endpoint,
            TransportDefinition::Partitioned { control_endpoint } => control_endpoint,
        }
    }
}

impl From<TransportYaml> for TransportDefinition {
    fn from(transport: TransportYaml) -> Self {
        match transport {
            TransportYaml::Remote { endpoint } => TransportDefinition::Remote { endpoint },
            TransportYaml::Partitioned { control_endpoint } => {
                TransportDefinition::Partitioned { control_endpoint }
            }
        }
    }
}

/// An out-of-process plugin to register at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDefinition {
    pub id: String,
    pub transport: TransportDefinition,
}

/// Plugin client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub remote: RemoteConfig,
    pub middleware: MiddlewareConfig,
    pub plugins: Vec<PluginDefinition>,
}

impl ClientConfig {
    /// Load configuration from environment variables over defaults
    ///
    /// The .env file is loaded by the binary at startup, so its values are
    /// already part of the environment here.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        env::apply_env(&mut config, lookup)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After merging, the final configuration is validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        Self::from_yaml(yaml_config, |name| std::env::var(name).ok())
    }

    /// Merge a parsed YAML configuration over the environment
    pub fn from_yaml<F>(yaml_config: YamlConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        env::apply_env(&mut config, lookup)?;

        if let Some(remote) = yaml_config.remote {
            if let Some(value) = remote.connect_timeout_secs {
                config.remote.connect_timeout_secs = value;
            }
            if let Some(value) = remote.request_timeout_secs {
                config.remote.request_timeout_secs = value;
            }
            if let Some(value) = remote.allow_insecure_public {
                config.remote.allow_insecure_public = value;
            }
        }

        if let Some(middleware) = yaml_config.middleware {
            if let Some(value) = middleware.auth_headers {
                config.middleware.auth_headers = value;
            }
            if let Some(value) = middleware.skip_cookie_names {
                config.middleware.skip_cookie_names = value;
            }
            if let Some(value) = middleware.token_expiry_skew_secs {
                config.middleware.token_expiry_skew_secs = value;
            }
        }

        if let Some(plugins) = yaml_config.plugins {
            config.plugins = plugins
                .into_iter()
                .map(|plugin| PluginDefinition {
                    id: plugin.id,
                    transport: plugin.transport.into(),
                })
                .collect();
        }

        validation::validate(&config)?;
        Ok(config)
    }

    pub fn plugin(&self, id: &str) -> Option<&PluginDefinition> {
        self.plugins.iter().find(|plugin| plugin.id == id)
    }
}
