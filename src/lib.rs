pub mod config;
pub mod middleware;
pub mod plugin;
pub mod transport;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ClientConfig, ConfigError};
pub use middleware::{Middleware, Pipeline};
pub use plugin::{CallContext, Client, ClientProvider, PluginError, PluginRegistry};
