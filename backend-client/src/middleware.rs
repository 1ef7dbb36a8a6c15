//! Request instrumentation for the backend client.
//!
//! Two tower layers wrap the transport of every [`HttpClient`](crate::HttpClient):
//!
//! - [`CorrelationLayer`] makes sure each request carries an `X-Request-Id`
//!   header so the backend can correlate its logs with ours.
//! - [`TracingLayer`] runs each request inside an `http.client.request` span
//!   and records the response status.
//!
//! Neither layer changes the request body or the response.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderName, HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::Instrument;

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id to send with a request.
///
/// Insert it as a request extension to reuse an id from an incoming request;
/// without one a random id is generated.
///
/// ```ignore
/// let mut req = http::Request::get(client.url("/api/v4/internal/check"))
///     .body(ClientBody::empty())?;
/// req.extensions_mut().insert(CorrelationId::new("01HQ4ZB3V8N"));
/// client.request(req).await?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layer that adds an `X-Request-Id` header to requests lacking one.
///
/// The value is taken from a [`CorrelationId`] request extension when present,
/// otherwise a new id is generated.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationLayer;

impl CorrelationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for CorrelationService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if !req.headers().contains_key(&REQUEST_ID_HEADER) {
            let value = req
                .extensions()
                .get::<CorrelationId>()
                .and_then(|id| HeaderValue::from_str(id.as_str()).ok())
                .or_else(|| HeaderValue::from_str(CorrelationId::generate().as_str()).ok());
            if let Some(value) = value {
                req.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
        }
        self.inner.call(req)
    }
}

/// Layer that wraps each request in a tracing span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S, B, ResB> Service<Request<B>> for TracingService<S>
where
    S: Service<Request<B>, Response = Response<ResB>>,
    S::Error: Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let span = tracing::info_span!(
            "http.client.request",
            http.method = %req.method(),
            http.url = %req.uri(),
            http.status_code = tracing::field::Empty,
            correlation_id = %correlation_id,
            otel.kind = "client",
        );

        let response = self.inner.call(req);
        Box::pin(
            async move {
                match response.await {
                    Ok(res) => {
                        tracing::Span::current()
                            .record("http.status_code", res.status().as_u16());
                        Ok(res)
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "request failed");
                        Err(err)
                    }
                }
            }
            .instrument(span),
        )
    }
}
