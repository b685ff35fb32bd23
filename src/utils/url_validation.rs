//! Plugin endpoint validation
//!
//! Plugin endpoints carry datasource secrets and user tokens, so plaintext
//! `http` is only accepted for endpoints on loopback or private networks
//! unless the configuration explicitly opts in. Endpoints must:
//! - Use `http` or `https`
//! - Name a host (the port defaults to the scheme's)
//! - Not send plaintext traffic to a public address

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during endpoint validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("Unsupported endpoint scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("Plaintext endpoint resolves to public address {0}; use https or allow_insecure_public")]
    PlaintextToPublicAddress(IpAddr),
}

/// Checks if an IPv4 address is private/internal
///
/// Covers loopback, RFC 1918, link-local, broadcast, unspecified,
/// documentation, CGNAT (100.64.0.0/10) and benchmarking (198.18.0.0/15).
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
    {
        return true;
    }
    let octets = ip.octets();
    // CGNAT
    if octets[0] == 100 && (octets[1] & 0xC0) == 64 {
        return true;
    }
    octets[0] == 198 && (octets[1] == 18 || octets[1] == 19)
}

/// Checks if an IPv6 address is private/internal
///
/// Covers loopback, unspecified, link-local (fe80::/10), unique local
/// (fc00::/7), documentation (2001:db8::/32) and IPv4-mapped private
/// addresses.
pub fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    let segments = ip.segments();
    if segments[0] & 0xFFC0 == 0xFE80 || segments[0] & 0xFE00 == 0xFC00 {
        return true;
    }
    if segments[0] == 0x2001 && segments[1] == 0x0DB8 {
        return true;
    }
    ip.to_ipv4_mapped()
        .map(|ipv4| is_private_ipv4(&ipv4))
        .unwrap_or(false)
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => is_private_ipv6(ipv6),
    }
}

/// Validates a plugin gRPC endpoint
///
/// Plaintext endpoints given by hostname are resolved; every resolved
/// address must be private. A hostname that does not resolve yet is
/// accepted with a warning, since plugin hosts are often started after the
/// client's configuration is loaded.
///
/// # Example
/// ```rust,ignore
/// use backend_plugin_client::utils::validate_plugin_endpoint;
///
/// assert!(validate_plugin_endpoint("http://127.0.0.1:50051", false).is_ok());
/// assert!(validate_plugin_endpoint("https://plugins.example.com:443", false).is_ok());
/// assert!(validate_plugin_endpoint("http://8.8.8.8:50051", false).is_err());
/// ```
pub fn validate_plugin_endpoint(
    endpoint: &str,
    allow_insecure_public: bool,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(endpoint)?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(UrlValidationError::UnsupportedScheme(scheme.to_string()));
    }

    let host = parsed.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.is_empty() {
        return Err(UrlValidationError::MissingHost);
    }
    let port = parsed
        .port_or_known_default()
        .ok_or(UrlValidationError::MissingHost)?;

    if scheme == "https" || allow_insecure_public {
        return Ok(parsed);
    }

    // host() distinguishes IP literals; host_str() brackets IPv6
    let addresses: Vec<IpAddr> = match parsed.host().map(|host| host.to_owned()) {
        Some(url::Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(url::Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(url::Host::Domain(domain)) if domain == "localhost" => return Ok(parsed),
        Some(url::Host::Domain(domain)) => match (domain.as_str(), port).to_socket_addrs() {
            Ok(resolved) => resolved.map(|addr| addr.ip()).collect(),
            Err(e) => {
                warn!(host = %domain, error = %e, "Could not resolve plugin endpoint host");
                return Ok(parsed);
            }
        },
        None => return Err(UrlValidationError::MissingHost),
    };

    if let Some(public) = addresses.into_iter().find(|ip| !is_private_ip(ip)) {
        warn!(
            endpoint = %endpoint,
            resolved_ip = %public,
            "Plaintext plugin endpoint points at a public address"
        );
        return Err(UrlValidationError::PlaintextToPublicAddress(public));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ipv4_ranges() {
        assert!(is_private_ipv4(&Ipv4Addr::new(127, 0, 0, 1)));
        assert!(is_private_ipv4(&Ipv4Addr::new(10, 1, 2, 3)));
        assert!(is_private_ipv4(&Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_private_ipv4(&Ipv4Addr::new(192, 168, 1, 1)));
        assert!(is_private_ipv4(&Ipv4Addr::new(100, 64, 0, 1)));
        assert!(!is_private_ipv4(&Ipv4Addr::new(8, 8, 8, 8)));
        assert!(!is_private_ipv4(&Ipv4Addr::new(172, 32, 0, 1)));
    }

    #[test]
    fn test_private_ipv6_ranges() {
        assert!(is_private_ipv6(&Ipv6Addr::LOCALHOST));
        assert!(is_private_ipv6(&"fe80::1".parse().unwrap()));
        assert!(is_private_ipv6(&"fd00::1".parse().unwrap()));
        assert!(is_private_ipv6(&"::ffff:10.0.0.1".parse().unwrap()));
        assert!(!is_private_ipv6(&"2606:4700::1111".parse().unwrap()));
    }

    #[test]
    fn test_plaintext_private_endpoints_accepted() {
        assert!(validate_plugin_endpoint("http://127.0.0.1:50051", false).is_ok());
        assert!(validate_plugin_endpoint("http://10.0.0.7:50051", false).is_ok());
        assert!(validate_plugin_endpoint("http://[::1]:50051", false).is_ok());
        assert!(validate_plugin_endpoint("http://localhost:50051", false).is_ok());
    }

    #[test]
    fn test_plaintext_public_endpoint_rejected() {
        let err = validate_plugin_endpoint("http://8.8.8.8:50051", false).unwrap_err();
        assert!(matches!(err, UrlValidationError::PlaintextToPublicAddress(_)));
        assert!(validate_plugin_endpoint("http://8.8.8.8:50051", true).is_ok());
    }

    #[test]
    fn test_tls_endpoint_accepted() {
        assert!(validate_plugin_endpoint("https://8.8.8.8:443", false).is_ok());
    }

    #[test]
    fn test_malformed_endpoints_rejected() {
        assert!(matches!(
            validate_plugin_endpoint("ftp://10.0.0.1:21", false),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_plugin_endpoint("unix:///tmp/plugin.sock", false),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_plugin_endpoint("not a url", false),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }
}
