//! Client configuration.
//!
//! This module holds the process-wide defaults (scheme prefixes, the socket
//! placeholder host, the default read timeout) and [`HttpClientConfig`], the
//! plain configuration struct a client is built from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::ClientError;

/// Scheme prefix selecting the Unix domain socket transport.
pub const UNIX_SOCKET_SCHEME: &str = "http+unix://";

/// Scheme prefix selecting the plain HTTP transport.
pub const HTTP_SCHEME: &str = "http://";

/// Scheme prefix selecting the HTTPS transport.
pub const HTTPS_SCHEME: &str = "https://";

/// Placeholder host used for requests sent over a Unix domain socket.
pub const SOCKET_BASE_URL: &str = "http://unix";

/// Read timeout applied when none is configured.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Configuration for building an [`HttpClient`](crate::HttpClient).
///
/// Can be deserialized from a config file; empty path strings are treated as
/// unset.
///
/// # Example
///
/// ```ignore
/// use backend_client::{HttpClient, HttpClientConfig};
///
/// let config = HttpClientConfig {
///     url: "http+unix:///var/run/backend.sock".into(),
///     relative_url_root: "/gitlab".into(),
///     ..Default::default()
/// };
/// let client = HttpClient::new(config)?;
/// assert_eq!(client.host(), "http://unix/gitlab");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Target URL; its prefix selects the transport.
    pub url: String,
    /// Path root appended to the placeholder host of socket transports.
    pub relative_url_root: String,
    /// PEM file with additional trusted certificates.
    #[serde(deserialize_with = "non_empty_path")]
    pub ca_file: Option<PathBuf>,
    /// Directory whose regular files are loaded as additional trusted certificates.
    #[serde(deserialize_with = "non_empty_path")]
    pub ca_path: Option<PathBuf>,
    /// Disable server certificate and hostname verification.
    pub self_signed_cert: bool,
    /// Read timeout in seconds, `0` selects [`DEFAULT_READ_TIMEOUT_SECS`].
    pub read_timeout_secs: u64,
    /// PEM client certificate chain for mutual TLS.
    #[serde(deserialize_with = "non_empty_path")]
    pub client_cert_path: Option<PathBuf>,
    /// PEM private key matching `client_cert_path`.
    #[serde(deserialize_with = "non_empty_path")]
    pub client_key_path: Option<PathBuf>,
}

impl HttpClientConfig {
    /// Create a configuration for the given URL with every option unset.
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// The client certificate and key paths, only when both are set.
    ///
    /// A partial pair is treated as no client certificate at all.
    pub fn client_identity(&self) -> Option<(&Path, &Path)> {
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    /// The effective read timeout.
    pub fn read_timeout(&self) -> Duration {
        read_timeout(self.read_timeout_secs)
    }

    /// Resolve the target URL into a transport endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, ClientError> {
        Endpoint::parse(&self.url, &self.relative_url_root)
    }
}

/// Convert a timeout in seconds into a [`Duration`], substituting the default for zero.
pub fn read_timeout(secs: u64) -> Duration {
    if secs == 0 {
        Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS)
    } else {
        Duration::from_secs(secs)
    }
}

/// Where and how to connect, derived from the target URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Requests go to `host` but every connection dials `socket_path`.
    Unix { socket_path: PathBuf, host: String },
    /// Plain HTTP to `url`.
    Http { url: String },
    /// HTTPS to `url`.
    Https { url: String },
}

impl Endpoint {
    /// Select the endpoint from the URL prefix.
    ///
    /// Prefixes are checked in order: `http+unix://`, `http://`, `https://`.
    /// Any other URL is rejected.
    pub fn parse(url: &str, relative_url_root: &str) -> Result<Self, ClientError> {
        if let Some(socket_path) = url.strip_prefix(UNIX_SOCKET_SCHEME) {
            Ok(Endpoint::Unix {
                socket_path: PathBuf::from(socket_path),
                host: socket_host(relative_url_root),
            })
        } else if url.starts_with(HTTP_SCHEME) {
            Ok(Endpoint::Http { url: url.to_owned() })
        } else if url.starts_with(HTTPS_SCHEME) {
            Ok(Endpoint::Https { url: url.to_owned() })
        } else {
            Err(ClientError::UnsupportedScheme(url.to_owned()))
        }
    }

    /// The host string requests should be addressed to.
    pub fn host(&self) -> &str {
        match self {
            Endpoint::Unix { host, .. } => host,
            Endpoint::Http { url } | Endpoint::Https { url } => url,
        }
    }
}

fn socket_host(relative_url_root: &str) -> String {
    let root = relative_url_root.trim_matches('/');
    if root.is_empty() {
        SOCKET_BASE_URL.to_owned()
    } else {
        format!("{SOCKET_BASE_URL}/{root}")
    }
}

fn non_empty_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()).map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_endpoint_with_root() {
        let endpoint = Endpoint::parse("http+unix:///var/run/backend.sock", "/gitlab/").unwrap();
        assert_eq!(
            endpoint,
            Endpoint::Unix {
                socket_path: PathBuf::from("/var/run/backend.sock"),
                host: "http://unix/gitlab".into(),
            }
        );
        assert_eq!(endpoint.host(), "http://unix/gitlab");
    }

    #[test]
    fn test_unix_endpoint_without_root() {
        for root in ["", "/", "//"] {
            let endpoint = Endpoint::parse("http+unix:///tmp/b.sock", root).unwrap();
            assert_eq!(endpoint.host(), "http://unix");
        }
    }

    #[test]
    fn test_unix_endpoint_nested_root() {
        let endpoint = Endpoint::parse("http+unix:///tmp/b.sock", "/a/b/").unwrap();
        assert_eq!(endpoint.host(), "http://unix/a/b");
    }

    #[test]
    fn test_http_endpoint_keeps_url() {
        let endpoint = Endpoint::parse("http://localhost:3000/prefix", "/ignored").unwrap();
        assert_eq!(
            endpoint,
            Endpoint::Http {
                url: "http://localhost:3000/prefix".into()
            }
        );
        assert_eq!(endpoint.host(), "http://localhost:3000/prefix");
    }

    #[test]
    fn test_https_endpoint_keeps_url() {
        let endpoint = Endpoint::parse("https://gitlab.example.com", "").unwrap();
        assert_eq!(endpoint.host(), "https://gitlab.example.com");
        assert!(matches!(endpoint, Endpoint::Https { .. }));
    }

    #[test]
    fn test_unknown_scheme() {
        for url in ["ftp://x", "", "unix:///tmp/s.sock", "HTTP://upper"] {
            let err = Endpoint::parse(url, "").unwrap_err();
            assert!(matches!(err, ClientError::UnsupportedScheme(_)), "{url}");
        }
    }

    #[test]
    fn test_read_timeout_default() {
        assert_eq!(read_timeout(0), Duration::from_secs(300));
        assert_eq!(read_timeout(45), Duration::from_secs(45));
    }

    #[test]
    fn test_client_identity_requires_both_paths() {
        let mut config = HttpClientConfig::new("https://example.com");
        assert!(config.client_identity().is_none());

        config.client_cert_path = Some("client.pem".into());
        assert!(config.client_identity().is_none());

        config.client_cert_path = None;
        config.client_key_path = Some("client.key".into());
        assert!(config.client_identity().is_none());

        config.client_cert_path = Some("client.pem".into());
        let (cert, key) = config.client_identity().unwrap();
        assert_eq!(cert, Path::new("client.pem"));
        assert_eq!(key, Path::new("client.key"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: HttpClientConfig =
            serde_json::from_str(r#"{"url": "http://localhost"}"#).unwrap();
        assert_eq!(config, HttpClientConfig::new("http://localhost"));
        assert_eq!(config.read_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_deserialize_empty_paths_are_unset() {
        let config: HttpClientConfig = serde_json::from_str(
            r#"{
                "url": "https://localhost",
                "ca_file": "",
                "ca_path": "/etc/ssl/extra",
                "self_signed_cert": true,
                "read_timeout_secs": 45,
                "client_cert_path": "",
                "client_key_path": null
            }"#,
        )
        .unwrap();
        assert_eq!(config.ca_file, None);
        assert_eq!(config.ca_path, Some(PathBuf::from("/etc/ssl/extra")));
        assert!(config.self_signed_cert);
        assert_eq!(config.read_timeout(), Duration::from_secs(45));
        assert!(config.client_identity().is_none());
    }
}
