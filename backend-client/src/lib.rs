//! HTTP client factory for backend services.
//!
//! This crate builds ready-to-use HTTP clients for talking to a backend that
//! may be reachable in one of three ways, selected by the URL prefix:
//!
//! - `http+unix://<socket path>` - requests go over a Unix domain socket
//! - `http://...` - plain TCP
//! - `https://...` - TLS, trusting the system roots plus an optional CA file
//!   and CA directory, with optional client certificate authentication
//!
//! Every request carries an `X-Request-Id` header, runs inside a tracing span
//! and is bounded by a read timeout (300 seconds unless configured). The
//! timeout covers the whole exchange, including reading the response body.
//!
//! ## Example
//!
//! ```ignore
//! use backend_client::{ClientBody, HttpClient, HttpClientConfig};
//!
//! let client = HttpClient::new(HttpClientConfig {
//!     url: "https://gitlab.example.com".into(),
//!     ca_file: Some("/etc/gitlab/ssl/ca.pem".into()),
//!     read_timeout_secs: 60,
//!     ..Default::default()
//! })?;
//!
//! let req = http::Request::get(client.url("/api/v4/internal/check"))
//!     .body(ClientBody::empty())?;
//! let res = client.request(req).await?;
//! println!("status: {}", res.status());
//! ```
//!
//! ## Unix Socket Example
//!
//! For socket transports the request host is a placeholder. Build URLs with
//! [`HttpClient::url`] so the relative URL root is kept:
//!
//! ```ignore
//! let client = HttpClient::builder("http+unix:///var/opt/gitlab/gitlab-workhorse/socket")
//!     .relative_url_root("/gitlab")
//!     .build()?;
//!
//! assert_eq!(client.host(), "http://unix/gitlab");
//! let req = http::Request::post(client.url("/api/v4/internal/allowed"))
//!     .header("content-type", "application/json")
//!     .body(ClientBody::from(r#"{"action":"git-upload-pack"}"#))?;
//! let res = client.request(req).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `tls-ring` (default) - use ring as the rustls crypto provider
//! - `tls-aws-lc` - use aws-lc-rs as the rustls crypto provider

mod builder;
mod client;
pub mod config;
mod error;
pub mod middleware;
pub mod timeout;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use builder::HttpClientBuilder;
#[allow(deprecated)]
pub use client::{HttpClient, ResponseBody, new_http_client};
pub use error::ClientError;

// Re-export from config module
pub use config::{
    DEFAULT_READ_TIMEOUT_SECS, Endpoint, HTTP_SCHEME, HTTPS_SCHEME, HttpClientConfig,
    SOCKET_BASE_URL, UNIX_SOCKET_SCHEME,
};

// Re-export the types needed to send requests
pub use middleware::CorrelationId;
pub use transport::{ClientBody, TransportKind};

pub use bytes::Bytes;
