//! Client builder for the backend client.
//!
//! Provides a fluent API for configuring and building an [`HttpClient`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::client::HttpClient;
use crate::config::{Endpoint, HttpClientConfig};
use crate::transport::{BackendConnector, build_tls_config};
use crate::ClientError;

/// Builder for creating an [`HttpClient`].
///
/// All options are collected first; [`build`](Self::build) validates the URL,
/// loads TLS material and assembles the transport in one step.
///
/// # Example
///
/// ```ignore
/// use backend_client::HttpClientBuilder;
///
/// let client = HttpClientBuilder::new("https://gitlab.example.com")
///     .ca_file("/etc/gitlab/ssl/ca.pem")
///     .client_cert("/etc/gitlab/ssl/client.pem", "/etc/gitlab/ssl/client.key")
///     .read_timeout_secs(60)
///     .build()?;
/// ```
#[derive(Clone, Debug)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new builder for the given target URL.
    ///
    /// The URL must start with `http+unix://`, `http://` or `https://`.
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            config: HttpClientConfig::new(url),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Path root appended to the placeholder host of socket transports.
    ///
    /// Leading and trailing slashes are ignored. Has no effect for HTTP(S) URLs.
    pub fn relative_url_root<S: Into<String>>(mut self, root: S) -> Self {
        self.config.relative_url_root = root.into();
        self
    }

    /// Trust the certificates in this PEM file in addition to the system roots.
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_file = Some(path.into());
        self
    }

    /// Trust the certificates found in the regular files of this directory.
    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_path = Some(path.into());
        self
    }

    /// Accept any server certificate, including self-signed ones.
    ///
    /// # Warning
    ///
    /// This disables certificate and hostname verification and makes the
    /// connection vulnerable to man-in-the-middle attacks.
    pub fn self_signed_cert(mut self, enabled: bool) -> Self {
        self.config.self_signed_cert = enabled;
        self
    }

    /// Set the per-request timeout in seconds.
    ///
    /// `0` selects the default of 300 seconds.
    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.config.read_timeout_secs = secs;
        self
    }

    /// Present this certificate and key to the server (mutual TLS).
    ///
    /// The certificate file may contain intermediates after the client
    /// certificate.
    pub fn client_cert(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.config.client_cert_path = Some(cert_path.into());
        self.config.client_key_path = Some(key_path.into());
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Build the client.
    ///
    /// Fails with [`ClientError::UnsupportedScheme`] for an unknown URL prefix
    /// and with [`ClientError::ClientCertificate`] when a configured client
    /// certificate or key cannot be loaded.
    pub fn build(self) -> Result<HttpClient, ClientError> {
        let config = self.config;
        let endpoint = config.endpoint()?;

        let (connector, tls_config) = match &endpoint {
            Endpoint::Unix { socket_path, .. } => (BackendConnector::unix(socket_path), None),
            Endpoint::Http { .. } => (BackendConnector::http(), None),
            Endpoint::Https { .. } => {
                let tls_config = build_tls_config(&config)?;
                (
                    BackendConnector::https(tls_config.clone()),
                    Some(Arc::new(tls_config)),
                )
            }
        };

        let timeout = config.read_timeout();
        tracing::debug!(
            transport = %connector.kind(),
            host = endpoint.host(),
            timeout_secs = timeout.as_secs(),
            "built backend HTTP client"
        );

        Ok(HttpClient::from_parts(
            connector,
            endpoint.host().to_owned(),
            timeout,
            tls_config,
        ))
    }
}
