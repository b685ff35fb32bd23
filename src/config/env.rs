//! Environment variable loading

use super::{ClientConfig, ConfigError};

pub(super) const CONNECT_TIMEOUT_VAR: &str = "PLUGIN_CONNECT_TIMEOUT_SECS";
pub(super) const REQUEST_TIMEOUT_VAR: &str = "PLUGIN_REQUEST_TIMEOUT_SECS";
pub(super) const ALLOW_INSECURE_PUBLIC_VAR: &str = "PLUGIN_ALLOW_INSECURE_PUBLIC";
pub(super) const AUTH_HEADERS_VAR: &str = "PLUGIN_AUTH_HEADERS";
pub(super) const SKIP_COOKIES_VAR: &str = "PLUGIN_SKIP_COOKIES";
pub(super) const TOKEN_EXPIRY_SKEW_VAR: &str = "PLUGIN_TOKEN_EXPIRY_SKEW_SECS";

fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Comma-separated list; blank entries dropped
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply environment values over the defaults.
///
/// `lookup` abstracts `std::env::var` so the parsing can be tested without
/// touching the process environment.
pub(super) fn apply_env<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(CONNECT_TIMEOUT_VAR) {
        config.remote.connect_timeout_secs = parse_u64(CONNECT_TIMEOUT_VAR, &value)?;
    }
    if let Some(value) = lookup(REQUEST_TIMEOUT_VAR) {
        config.remote.request_timeout_secs = parse_u64(REQUEST_TIMEOUT_VAR, &value)?;
    }
    if let Some(value) = lookup(ALLOW_INSECURE_PUBLIC_VAR) {
        config.remote.allow_insecure_public = parse_bool(ALLOW_INSECURE_PUBLIC_VAR, &value)?;
    }
    if let Some(value) = lookup(AUTH_HEADERS_VAR) {
        config.middleware.auth_headers = parse_list(&value);
    }
    if let Some(value) = lookup(SKIP_COOKIES_VAR) {
        config.middleware.skip_cookie_names = parse_list(&value);
    }
    if let Some(value) = lookup(TOKEN_EXPIRY_SKEW_VAR) {
        config.middleware.token_expiry_skew_secs = parse_u64(TOKEN_EXPIRY_SKEW_VAR, &value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_defaults() {
        let mut config = ClientConfig::default();
        apply_env(
            &mut config,
            lookup_from(&[
                (CONNECT_TIMEOUT_VAR, "2"),
                (ALLOW_INSECURE_PUBLIC_VAR, "yes"),
                (AUTH_HEADERS_VAR, "Authorization, X-Custom-Auth,"),
            ]),
        )
        .unwrap();

        assert_eq!(config.remote.connect_timeout_secs, 2);
        assert_eq!(config.remote.request_timeout_secs, 30);
        assert!(config.remote.allow_insecure_public);
        assert_eq!(
            config.middleware.auth_headers,
            vec!["Authorization".to_string(), "X-Custom-Auth".to_string()]
        );
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = ClientConfig::default();
        let err = apply_env(&mut config, lookup_from(&[(REQUEST_TIMEOUT_VAR, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == REQUEST_TIMEOUT_VAR));
    }

    #[test]
    fn test_env_invalid_bool() {
        let mut config = ClientConfig::default();
        assert!(
            apply_env(
                &mut config,
                lookup_from(&[(ALLOW_INSECURE_PUBLIC_VAR, "maybe")])
            )
            .is_err()
        );
    }
}
