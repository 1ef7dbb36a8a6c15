//! Connectors for the three backend transports.
//!
//! [`BackendConnector`] is the connector handed to hyper_util's legacy client.
//! It dials a fixed Unix socket, plain TCP, or TCP + TLS depending on how the
//! client was configured, and yields a [`BackendStream`] in every case so one
//! client type covers all transports.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder, MaybeHttpsStream};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use pin_project_lite::pin_project;
use tokio::net::{TcpStream, UnixStream};
use tower::BoxError;
use tower_service::Service;

use super::TransportKind;

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Connector that always dials the same Unix domain socket.
///
/// The URI of the request is ignored, requests can therefore be addressed to
/// any placeholder host.
#[derive(Clone, Debug)]
pub struct UnixConnector {
    socket_path: Arc<Path>,
}

impl UnixConnector {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: Arc::from(socket_path.as_ref()),
        }
    }

    /// The socket every connection is made to.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Service<Uri> for UnixConnector {
    type Response = TokioIo<UnixStream>;
    type Error = io::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let socket_path = self.socket_path.clone();
        Box::pin(async move { UnixStream::connect(&*socket_path).await.map(TokioIo::new) })
    }
}

/// Build an HTTPS connector with the given TLS configuration.
///
/// Only `https://` URIs are accepted; HTTP/1.1 and HTTP/2 are offered via ALPN.
pub fn build_https_connector(tls_config: rustls::ClientConfig) -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_only()
        .enable_all_versions()
        .build()
}

/// The connector behind an [`HttpClient`](crate::HttpClient).
#[derive(Clone, Debug)]
pub enum BackendConnector {
    Unix(UnixConnector),
    Http(HttpConnector),
    Https(HttpsConnector<HttpConnector>),
}

impl BackendConnector {
    /// Dial `socket_path` for every connection.
    pub fn unix(socket_path: impl AsRef<Path>) -> Self {
        BackendConnector::Unix(UnixConnector::new(socket_path))
    }

    /// Plain TCP, no TLS.
    pub fn http() -> Self {
        BackendConnector::Http(HttpConnector::new())
    }

    /// TCP + TLS using `tls_config`.
    pub fn https(tls_config: rustls::ClientConfig) -> Self {
        BackendConnector::Https(build_https_connector(tls_config))
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            BackendConnector::Unix(_) => TransportKind::Unix,
            BackendConnector::Http(_) => TransportKind::Http,
            BackendConnector::Https(_) => TransportKind::Https,
        }
    }
}

impl Service<Uri> for BackendConnector {
    type Response = BackendStream;
    type Error = BoxError;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self {
            BackendConnector::Unix(connector) => connector.poll_ready(cx).map_err(Into::into),
            BackendConnector::Http(connector) => connector.poll_ready(cx).map_err(Into::into),
            BackendConnector::Https(connector) => connector.poll_ready(cx),
        }
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        match self {
            BackendConnector::Unix(connector) => {
                let connecting = connector.call(uri);
                Box::pin(async move {
                    Ok::<_, BoxError>(BackendStream::Unix {
                        io: connecting.await?,
                    })
                })
            }
            BackendConnector::Http(connector) => {
                let connecting = connector.call(uri);
                Box::pin(async move {
                    Ok::<_, BoxError>(BackendStream::Tcp {
                        io: connecting.await?,
                    })
                })
            }
            BackendConnector::Https(connector) => {
                let connecting = connector.call(uri);
                Box::pin(async move {
                    Ok::<_, BoxError>(BackendStream::Tls {
                        io: connecting.await?,
                    })
                })
            }
        }
    }
}

pin_project! {
    /// A connection produced by [`BackendConnector`].
    #[project = BackendStreamProj]
    pub enum BackendStream {
        Unix {
            #[pin]
            io: TokioIo<UnixStream>,
        },
        Tcp {
            #[pin]
            io: TokioIo<TcpStream>,
        },
        Tls {
            #[pin]
            io: MaybeHttpsStream<TokioIo<TcpStream>>,
        },
    }
}

impl Connection for BackendStream {
    fn connected(&self) -> Connected {
        match self {
            BackendStream::Unix { .. } => Connected::new(),
            BackendStream::Tcp { io } => io.connected(),
            BackendStream::Tls { io } => io.connected(),
        }
    }
}

impl Read for BackendStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            BackendStreamProj::Unix { io } => io.poll_read(cx, buf),
            BackendStreamProj::Tcp { io } => io.poll_read(cx, buf),
            BackendStreamProj::Tls { io } => io.poll_read(cx, buf),
        }
    }
}

impl Write for BackendStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            BackendStreamProj::Unix { io } => io.poll_write(cx, buf),
            BackendStreamProj::Tcp { io } => io.poll_write(cx, buf),
            BackendStreamProj::Tls { io } => io.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            BackendStreamProj::Unix { io } => io.poll_flush(cx),
            BackendStreamProj::Tcp { io } => io.poll_flush(cx),
            BackendStreamProj::Tls { io } => io.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            BackendStreamProj::Unix { io } => io.poll_shutdown(cx),
            BackendStreamProj::Tcp { io } => io.poll_shutdown(cx),
            BackendStreamProj::Tls { io } => io.poll_shutdown(cx),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            BackendStream::Unix { io } => io.is_write_vectored(),
            BackendStream::Tcp { io } => io.is_write_vectored(),
            BackendStream::Tls { io } => io.is_write_vectored(),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            BackendStreamProj::Unix { io } => io.poll_write_vectored(cx, bufs),
            BackendStreamProj::Tcp { io } => io.poll_write_vectored(cx, bufs),
            BackendStreamProj::Tls { io } => io.poll_write_vectored(cx, bufs),
        }
    }
}

impl std::fmt::Debug for BackendStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStream::Unix { .. } => write!(f, "BackendStream::Unix"),
            BackendStream::Tcp { .. } => write!(f, "BackendStream::Tcp"),
            BackendStream::Tls { .. } => write!(f, "BackendStream::Tls"),
        }
    }
}
