use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; whatever the
/// file leaves out comes from the environment or the defaults.
///
/// # Example YAML structure
/// ```yaml
/// remote:
///   connect_timeout_secs: 5
///   request_timeout_secs: 30
///   allow_insecure_public: false
///
/// middleware:
///   auth_headers: ["Authorization", "X-Id-Token", "X-Api-Key"]
///   skip_cookie_names: ["app_session", "app_session_expiry"]
///   token_expiry_skew_secs: 10
///
/// plugins:
///   - id: "prometheus"
///     transport:
///       type: remote
///       endpoint: "http://127.0.0.1:50051"
///   - id: "sharded-tsdb"
///     transport:
///       type: partitioned
///       control_endpoint: "http://10.0.0.5:50051"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub remote: Option<RemoteYaml>,
    pub middleware: Option<MiddlewareYaml>,
    pub plugins: Option<Vec<PluginYaml>>,
}

/// Remote transport settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RemoteYaml {
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub allow_insecure_public: Option<bool>,
}

/// Middleware settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MiddlewareYaml {
    pub auth_headers: Option<Vec<String>>,
    pub skip_cookie_names: Option<Vec<String>>,
    pub token_expiry_skew_secs: Option<u64>,
}

/// One plugin definition from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct PluginYaml {
    pub id: String,
    pub transport: TransportYaml,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportYaml {
    Remote { endpoint: String },
    Partitioned { control_endpoint: String },
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_yaml_full_config() {
        let yaml = r#"
remote:
  connect_timeout_secs: 2
middleware:
  skip_cookie_names: ["grafana_session"]
plugins:
  - id: prometheus
    transport:
      type: remote
      endpoint: "http://127.0.0.1:50051"
  - id: sharded
    transport:
      type: partitioned
      control_endpoint: "http://10.0.0.5:50051"
"#;
        let config = YamlConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.remote.unwrap().connect_timeout_secs, Some(2));
        assert_eq!(
            config.middleware.unwrap().skip_cookie_names,
            Some(vec!["grafana_session".to_string()])
        );
        let plugins = config.plugins.unwrap();
        assert_eq!(plugins.len(), 2);
        assert_eq!(
            plugins[1].transport,
            TransportYaml::Partitioned {
                control_endpoint: "http://10.0.0.5:50051".to_string()
            }
        );
    }

    #[test]
    fn test_yaml_empty_config() {
        let config = YamlConfig::from_yaml_str("{}").unwrap();
        assert!(config.remote.is_none());
        assert!(config.plugins.is_none());
    }

    #[test]
    fn test_yaml_unknown_transport_rejected() {
        let yaml = r#"
plugins:
  - id: broken
    transport:
      type: carrier_pigeon
"#;
        assert!(matches!(
            YamlConfig::from_yaml_str(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_yaml_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "remote:\n  allow_insecure_public: true").unwrap();
        let config = YamlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.remote.unwrap().allow_insecure_public, Some(true));
    }

    #[test]
    fn test_yaml_missing_file() {
        let err = YamlConfig::from_file(Path::new("/nonexistent/plugins.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
