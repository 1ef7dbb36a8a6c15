//! Client error types.
//!
//! This module provides [`ClientError`], the error type for building an
//! [`HttpClient`](crate::HttpClient) and for the requests sent through it.

use std::time::Duration;

/// Errors produced while constructing a client or sending a request.
///
/// Construction fails only for [`UnsupportedScheme`](ClientError::UnsupportedScheme),
/// [`ClientCertificate`](ClientError::ClientCertificate) and
/// [`Tls`](ClientError::Tls). Problems with the system trust store or with
/// individual CA files are absorbed while the trust pool is assembled.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// The target URL does not start with a known scheme prefix.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The client certificate or its private key could not be loaded.
    #[error("client certificate error: {0}")]
    ClientCertificate(String),

    /// No usable TLS configuration could be assembled.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Transport-level error (connection failed, broken pipe, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the client timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Returns true if the error was raised while building the client.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            ClientError::UnsupportedScheme(_)
                | ClientError::ClientCertificate(_)
                | ClientError::Tls(_)
        )
    }

    /// Returns true if the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    /// Convert a boxed error coming out of the tower stack.
    ///
    /// `ClientError`s raised by inner layers are passed through unchanged.
    pub(crate) fn from_boxed(err: tower::BoxError) -> Self {
        match err.downcast::<ClientError>() {
            Ok(err) => *err,
            Err(err) => ClientError::Transport(error_chain(&*err)),
        }
    }
}

/// Render an error and its sources as `outer: inner: root`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}
