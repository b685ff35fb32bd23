//! Lifecycle Tests
//!
//! Configuration file → registry → start/stop/decommission → provider.
//!
//! Run: cargo test --test lifecycle_tests

mod mock_plugins;

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio_test::assert_ok;

use backend_plugin_client::plugin::prelude::*;
use backend_plugin_client::plugin::{PluginState, TransportKind};
use backend_plugin_client::{ClientConfig, ClientProvider, Pipeline};

use mock_plugins::TestDataPlugin;

const CONFIG: &str = r#"
remote:
  connect_timeout_secs: 1
  request_timeout_secs: 2

plugins:
  - id: "Unreachable"
    transport:
      type: remote
      endpoint: "http://127.0.0.1:9"
"#;

fn load_config() -> ClientConfig {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    ClientConfig::from_file(file.path()).unwrap()
}

fn provider(registry: &Arc<PluginRegistry>, config: &ClientConfig) -> ClientProvider {
    ClientProvider::new(registry.clone(), Pipeline::standard(config, None))
}

#[tokio::test]
async fn test_failed_start_leaves_plugin_unavailable() {
    let config = load_config();
    assert_eq!(config.remote.connect_timeout_secs, 1);

    let registry = Arc::new(PluginRegistry::from_config(&config).unwrap());
    registry
        .register_local("testdata", TestDataPlugin::new().backend())
        .unwrap();
    assert_eq!(registry.plugin_ids(), vec!["testdata", "unreachable"]);
    assert_eq!(
        registry.lookup("unreachable").unwrap().kind(),
        TransportKind::Remote
    );

    let failures = registry.start_all().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "unreachable");
    assert!(matches!(failures[0].1, PluginError::Connection(_)));

    let provider = provider(&registry, &config);
    assert!(matches!(
        provider.client("Unreachable").await,
        Err(PluginError::Unavailable(_))
    ));

    let client = assert_ok!(provider.client("testdata").await);
    let health = client
        .check_health(&CallContext::new(), CheckHealthRequest::default())
        .await
        .unwrap();
    assert_eq!(health.status, HealthStatus::Ok);
}

#[tokio::test]
async fn test_stop_and_restart() {
    let registry = Arc::new(PluginRegistry::new());
    let plugin = TestDataPlugin::new();
    let instance = registry.register_local("testdata", plugin.backend()).unwrap();
    let provider = provider(&registry, &ClientConfig::default());

    assert_eq!(instance.state().await, PluginState::Created);
    instance.start().await.unwrap();
    assert_eq!(instance.state().await, PluginState::Started);

    instance.stop().await.unwrap();
    assert!(instance.exited().await);
    assert!(matches!(
        provider.client("testdata").await,
        Err(PluginError::Unavailable(_))
    ));

    instance.start().await.unwrap();
    assert!(!instance.exited().await);
    assert_ok!(provider.client("testdata").await);
}

#[tokio::test]
async fn test_decommission_is_terminal() {
    let registry = Arc::new(PluginRegistry::new());
    let instance = registry
        .register_local("testdata", TestDataPlugin::new().backend())
        .unwrap();
    instance.start().await.unwrap();
    let provider = provider(&registry, &ClientConfig::default());

    // A client handed out before decommissioning keeps working
    let client = provider.client("testdata").await.unwrap();
    assert!(registry.decommission("testdata"));
    assert!(instance.is_decommissioned());

    assert!(matches!(
        provider.client("testdata").await,
        Err(PluginError::NotRegistered(_))
    ));
    assert!(matches!(
        instance.start().await,
        Err(PluginError::Unavailable(_))
    ));

    let health = client
        .check_health(&CallContext::new(), CheckHealthRequest::default())
        .await
        .unwrap();
    assert_eq!(health.status, HealthStatus::Ok);

    // The id can be reused by a fresh registration
    let replacement = registry
        .register_local("testdata", TestDataPlugin::new().backend())
        .unwrap();
    replacement.start().await.unwrap();
    assert_ok!(provider.client("testdata").await);
}
