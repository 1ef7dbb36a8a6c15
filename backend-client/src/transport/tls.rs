//! TLS configuration for HTTPS backends.
//!
//! The trust pool starts from the system roots and is extended with the
//! certificates found in an optional CA file and an optional CA directory.
//! Loading extra CA material is best effort: files that cannot be read or
//! parsed are skipped and counted, never fatal. A client certificate is
//! different, if one is configured it must load or the client is not built.
//!
//! # Feature Flags
//!
//! A crypto provider is picked from the enabled features:
//!
//! - `tls-ring` - Use ring crypto (default)
//! - `tls-aws-lc` - Use AWS LC crypto
//!
//! Without either feature, a provider installed process-wide with
//! `CryptoProvider::install_default()` is used.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::{ClientError, HttpClientConfig};

/// Protocol versions offered to HTTPS backends. TLS 1.2 is the floor.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Pick the crypto provider.
///
/// Priority:
/// 1. Feature-gated provider (tls-ring or tls-aws-lc)
/// 2. User-installed global default provider
pub fn crypto_provider() -> Result<Arc<CryptoProvider>, ClientError> {
    #[cfg(feature = "tls-ring")]
    return Ok(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    return Ok(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    {
        CryptoProvider::get_default().cloned().ok_or_else(|| {
            ClientError::Tls(
                "no crypto provider: enable `tls-ring` or `tls-aws-lc`, \
                 or install one with `CryptoProvider::install_default()`"
                    .into(),
            )
        })
    }
}

/// A trust pool together with a record of how it was assembled.
#[derive(Debug, Clone)]
pub struct TrustStore {
    /// The assembled root certificates.
    pub roots: RootCertStore,
    /// Roots taken from the system store.
    pub system: usize,
    /// Roots added from the CA file and CA directory.
    pub added: usize,
    /// CA files that were unreadable or held no usable certificate.
    pub skipped: Vec<PathBuf>,
}

impl TrustStore {
    /// Assemble the trust pool from the system roots plus optional CA sources.
    ///
    /// The CA directory is scanned without recursion and only regular files
    /// are considered.
    pub fn load(ca_file: Option<&Path>, ca_path: Option<&Path>) -> Self {
        let roots = system_roots();
        let mut store = TrustStore {
            system: roots.len(),
            roots,
            added: 0,
            skipped: Vec::new(),
        };

        if let Some(file) = ca_file {
            store.add_pem_file(file);
        }

        if let Some(dir) = ca_path {
            match fs::read_dir(dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                        if !is_dir {
                            store.add_pem_file(&entry.path());
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(path = %dir.display(), error = %err, "cannot read CA directory");
                }
            }
        }

        if !store.skipped.is_empty() {
            tracing::warn!(
                skipped = store.skipped.len(),
                files = ?store.skipped,
                "skipped unusable CA certificate files"
            );
        }

        store
    }

    fn add_pem_file(&mut self, path: &Path) {
        let pem = match fs::read(path) {
            Ok(pem) => pem,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cannot read CA file");
                self.skipped.push(path.to_path_buf());
                return;
            }
        };

        let certs = CertificateDer::pem_slice_iter(&pem).filter_map(Result::ok);
        let (added, _ignored) = self.roots.add_parsable_certificates(certs);
        if added == 0 {
            self.skipped.push(path.to_path_buf());
        }
        self.added += added;
    }
}

/// Load the system trust roots, or an empty store if none can be loaded.
fn system_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    if !native_certs.errors.is_empty() {
        // Some certs may have loaded successfully
        tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
    }
    let (added, ignored) = roots.add_parsable_certificates(native_certs.certs);
    if added == 0 {
        tracing::warn!(ignored, "system trust store unavailable, starting from an empty pool");
    }
    roots
}

/// Load a client certificate chain and its private key from PEM files.
///
/// The chain should contain the client certificate first, followed by any
/// intermediates.
pub fn load_client_identity(
    cert_path: &Path,
    key_path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ClientError> {
    let cert_error = |err: &dyn std::fmt::Display| {
        ClientError::ClientCertificate(format!("{}: {}", cert_path.display(), err))
    };

    let chain = CertificateDer::pem_file_iter(cert_path)
        .map_err(|e| cert_error(&e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| cert_error(&e))?;
    if chain.is_empty() {
        return Err(cert_error(&"no certificate found"));
    }

    let key = PrivateKeyDer::from_pem_file(key_path).map_err(|e| {
        ClientError::ClientCertificate(format!("{}: {}", key_path.display(), e))
    })?;

    Ok((chain, key))
}

/// The trust pool used to verify the server, `None` when any certificate is
/// accepted.
fn trust_store(config: &HttpClientConfig) -> Option<TrustStore> {
    if config.self_signed_cert {
        return None;
    }
    let trust = TrustStore::load(config.ca_file.as_deref(), config.ca_path.as_deref());
    tracing::debug!(
        system = trust.system,
        added = trust.added,
        skipped = trust.skipped.len(),
        "assembled TLS trust store"
    );
    Some(trust)
}

/// Build the rustls configuration for an HTTPS backend.
pub fn build_tls_config(config: &HttpClientConfig) -> Result<ClientConfig, ClientError> {
    let provider = crypto_provider()?;
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .map_err(|e| ClientError::Tls(e.to_string()))?;

    let builder = match trust_store(config) {
        Some(trust) => builder.with_root_certificates(trust.roots),
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SelfSignedVerifier::new(&provider))),
    };

    match config.client_identity() {
        Some((cert_path, key_path)) => {
            let (chain, key) = load_client_identity(cert_path, key_path)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| ClientError::ClientCertificate(e.to_string()))
        }
        None => Ok(builder.with_no_client_auth()),
    }
}

/// A verifier that accepts any server certificate and host name.
///
/// Handshake signatures are still checked against the presented certificate,
/// so the peer must hold the matching private key.
///
/// # Warning
///
/// This makes the connection vulnerable to man-in-the-middle attacks. It is
/// only installed when the client is configured to accept self-signed
/// certificates.
#[derive(Debug)]
pub struct SelfSignedVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl SelfSignedVerifier {
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for SelfSignedVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(all(test, feature = "tls-ring"))]
mod tests {
    use super::*;
    use crate::test_support::testdata;

    fn ca_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            fs::copy(testdata(name), dir.path().join(name)).unwrap();
        }
        dir
    }

    #[test]
    fn test_trust_store_without_extras() {
        let store = TrustStore::load(None, None);
        assert_eq!(store.added, 0);
        assert!(store.skipped.is_empty());
        assert_eq!(store.roots.len(), store.system);
    }

    #[test]
    fn test_trust_store_ca_file() {
        let store = TrustStore::load(Some(&testdata("ca.pem")), None);
        assert_eq!(store.added, 1);
        assert!(store.skipped.is_empty());
        assert_eq!(store.roots.len(), store.system + 1);
    }

    #[test]
    fn test_trust_store_missing_ca_file_is_skipped() {
        let missing = testdata("does-not-exist.pem");
        let store = TrustStore::load(Some(&missing), None);
        assert_eq!(store.added, 0);
        assert_eq!(store.skipped, vec![missing]);
    }

    #[test]
    fn test_trust_store_ca_dir_skips_corrupt_file() {
        let dir = ca_dir(&["ca.pem", "corrupt.pem"]);
        let store = TrustStore::load(None, Some(dir.path()));
        assert_eq!(store.added, 1);
        assert_eq!(store.skipped, vec![dir.path().join("corrupt.pem")]);
        assert_eq!(store.roots.len(), store.system + 1);
    }

    #[test]
    fn test_trust_store_ca_dir_ignores_subdirectories() {
        let dir = ca_dir(&["ca.pem"]);
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::copy(testdata("server.pem"), nested.join("server.pem")).unwrap();

        let store = TrustStore::load(None, Some(dir.path()));
        assert_eq!(store.added, 1);
        assert!(store.skipped.is_empty());
    }

    #[test]
    fn test_trust_store_missing_ca_dir() {
        let store = TrustStore::load(None, Some(Path::new("/nonexistent/ca/dir")));
        assert_eq!(store.added, 0);
        assert_eq!(store.roots.len(), store.system);
    }

    #[test]
    fn test_load_client_identity() {
        let (chain, _key) =
            load_client_identity(&testdata("client.pem"), &testdata("client.key")).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_load_client_identity_missing_key() {
        let err = load_client_identity(&testdata("client.pem"), &testdata("missing.key"))
            .unwrap_err();
        assert!(matches!(err, ClientError::ClientCertificate(_)));
    }

    #[test]
    fn test_load_client_identity_key_file_without_key() {
        let err =
            load_client_identity(&testdata("client.pem"), &testdata("ca.pem")).unwrap_err();
        assert!(matches!(err, ClientError::ClientCertificate(_)));
    }

    #[test]
    fn test_load_client_identity_cert_file_without_cert() {
        let err = load_client_identity(&testdata("client.key"), &testdata("client.key"))
            .unwrap_err();
        assert!(matches!(err, ClientError::ClientCertificate(_)));
    }

    #[test]
    fn test_build_tls_config_with_client_cert() {
        let mut config = HttpClientConfig::new("https://localhost");
        config.client_cert_path = Some(testdata("client.pem"));
        config.client_key_path = Some(testdata("client.key"));

        let tls = build_tls_config(&config).unwrap();
        assert!(tls.client_auth_cert_resolver.has_certs());
        let certified = tls
            .client_auth_cert_resolver
            .resolve(&[], &[SignatureScheme::RSA_PSS_SHA256])
            .unwrap();
        assert_eq!(certified.cert.len(), 1);
    }

    #[test]
    fn test_build_tls_config_mismatched_key() {
        let mut config = HttpClientConfig::new("https://localhost");
        config.client_cert_path = Some(testdata("client.pem"));
        config.client_key_path = Some(testdata("other.key"));

        let err = build_tls_config(&config).unwrap_err();
        assert!(matches!(err, ClientError::ClientCertificate(_)));
    }

    #[test]
    fn test_build_tls_config_partial_pair_is_ignored() {
        let mut config = HttpClientConfig::new("https://localhost");
        config.client_cert_path = Some(testdata("client.pem"));

        let tls = build_tls_config(&config).unwrap();
        assert!(!tls.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn test_build_tls_config_without_client_cert() {
        let config = HttpClientConfig::new("https://localhost");
        let tls = build_tls_config(&config).unwrap();
        assert!(!tls.client_auth_cert_resolver.has_certs());
        assert!(tls.alpn_protocols.is_empty());
    }

    #[test]
    fn test_trust_store_only_loaded_when_verifying() {
        let dir = ca_dir(&["ca.pem", "corrupt.pem"]);
        let mut config = HttpClientConfig::new("https://localhost");
        config.ca_path = Some(dir.path().to_path_buf());

        let trust = trust_store(&config).unwrap();
        assert_eq!(trust.added, 1);
        assert_eq!(trust.skipped.len(), 1);

        config.self_signed_cert = true;
        assert!(trust_store(&config).is_none());
        assert!(build_tls_config(&config).is_ok());
    }

    #[test]
    fn test_self_signed_verifier_accepts_unknown_cert() {
        let provider = crypto_provider().unwrap();
        let verifier = SelfSignedVerifier::new(&provider);
        let cert = CertificateDer::from_pem_file(testdata("server.pem")).unwrap();
        let name = ServerName::try_from("not-the-cert-name.example").unwrap();

        let verified = verifier.verify_server_cert(&cert, &[], &name, &[], UnixTime::now());
        assert!(verified.is_ok());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
