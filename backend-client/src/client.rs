//! The backend HTTP client handle.
//!
//! [`HttpClient`] pairs a ready transport with the host requests should be
//! addressed to. Requests go through, outermost first: correlation id,
//! tracing span, request deadline, and the hyper client. The deadline also
//! bounds reading the response body.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use http::{Request, Response};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_service::Service;

use crate::builder::HttpClientBuilder;
use crate::middleware::{CorrelationLayer, TracingLayer};
use crate::timeout::{DeadlineLayer, TimeoutBody};
use crate::transport::{BackendConnector, ClientBody, TransportKind};
use crate::{ClientError, HttpClientConfig};

/// Response body returned by [`HttpClient`].
///
/// Reading it fails with [`ClientError::Timeout`] once the request deadline
/// has passed.
pub type ResponseBody = TimeoutBody<Incoming>;

type BoxedService = BoxCloneSyncService<Request<ClientBody>, Response<ResponseBody>, ClientError>;

/// A configured client for a single backend.
///
/// Cloning is cheap and clones share the connection pool, so one client can
/// serve many concurrent requests.
///
/// # Example
///
/// ```ignore
/// use backend_client::{ClientBody, HttpClient};
///
/// let client = HttpClient::builder("http+unix:///var/run/backend.sock")
///     .relative_url_root("/gitlab")
///     .build()?;
///
/// let req = http::Request::get(client.url("/api/v4/internal/check"))
///     .body(ClientBody::empty())?;
/// let res = client.request(req).await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    service: BoxedService,
    host: String,
    timeout: Duration,
    transport: TransportKind,
    tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("host", &self.host)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .field("tls_config", &self.tls_config.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build a client from a configuration.
    ///
    /// Fails if the URL scheme is not supported or the configured client
    /// certificate cannot be loaded.
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        HttpClientBuilder::from_config(config).build()
    }

    /// Create a builder for the given target URL.
    pub fn builder<S: Into<String>>(url: S) -> HttpClientBuilder {
        HttpClientBuilder::new(url)
    }

    pub(crate) fn from_parts(
        connector: BackendConnector,
        host: String,
        timeout: Duration,
        tls_config: Option<Arc<rustls::ClientConfig>>,
    ) -> Self {
        let transport = connector.kind();
        let hyper_client: Client<BackendConnector, ClientBody> =
            Client::builder(TokioExecutor::new())
                .pool_timer(TokioTimer::new())
                .build(connector);

        let service = ServiceBuilder::new()
            .layer(CorrelationLayer::new())
            .layer(TracingLayer::new())
            .layer(DeadlineLayer::new(timeout))
            .service(hyper_client);

        Self {
            service: BoxCloneSyncService::new(service),
            host,
            timeout,
            transport,
            tls_config,
        }
    }

    /// The host requests should be addressed to.
    ///
    /// For socket transports this is a placeholder (`http://unix`, optionally
    /// followed by the relative URL root); otherwise it is the configured URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Join the host with `path`.
    pub fn url(&self, path: &str) -> String {
        let host = self.host.trim_end_matches('/');
        if path.is_empty() {
            host.to_owned()
        } else if path.starts_with('/') {
            format!("{host}{path}")
        } else {
            format!("{host}/{path}")
        }
    }

    /// The timeout applied to each request, response body included.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The transport this client was built with.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// The TLS configuration, present only for HTTPS clients.
    pub fn tls_config(&self) -> Option<&Arc<rustls::ClientConfig>> {
        self.tls_config.as_ref()
    }

    /// Send a request and wait for the response head.
    ///
    /// A single deadline, fixed when the request is issued, covers connecting,
    /// sending the request, receiving the response head and reading the body.
    pub async fn request(
        &self,
        request: Request<ClientBody>,
    ) -> Result<Response<ResponseBody>, ClientError> {
        self.service.clone().oneshot(request).await
    }
}

impl Service<Request<ClientBody>> for HttpClient {
    type Response = Response<ResponseBody>;
    type Error = ClientError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ClientBody>) -> Self::Future {
        self.service.call(req)
    }
}

/// Build a client, logging and discarding any error.
#[deprecated(note = "use `HttpClient::new` or `HttpClient::builder`, which return the error")]
pub fn new_http_client(config: HttpClientConfig) -> Option<HttpClient> {
    match HttpClient::new(config) {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::error!(error = %err, "failed to build backend HTTP client");
            None
        }
    }
}
