//! Transport layer for the backend client.
//!
//! Three transports are supported, selected from the target URL:
//!
//! - `http+unix://` - every connection dials a fixed Unix domain socket
//! - `http://` - plain TCP
//! - `https://` - TCP + TLS with rustls (system roots plus optional CA
//!   file/directory, optional client certificate)
//!
//! # Feature Flags
//!
//! - `tls-ring` (default) / `tls-aws-lc` - Crypto providers

mod body;
mod connector;
mod tls;

pub use body::ClientBody;
pub use connector::{
    BackendConnector, BackendStream, UnixConnector, build_https_connector,
};
pub use tls::{
    SelfSignedVerifier, TrustStore, build_tls_config, crypto_provider, load_client_identity,
};

/// Which transport a client was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Unix,
    Http,
    Https,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Unix => "unix",
            TransportKind::Http => "http",
            TransportKind::Https => "https",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
