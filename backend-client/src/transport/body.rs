//! Request body type for the backend client.
//!
//! [`ClientBody`] is the body type accepted by [`HttpClient`](crate::HttpClient)
//! for every transport.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;

use crate::ClientError;

pin_project! {
    /// A request body.
    ///
    /// - `Empty` for requests without payload (GET, HEAD, ...)
    /// - `Full` for a payload that is already in memory
    /// - `Streaming` for a payload produced by an async stream
    #[project = ClientBodyProj]
    pub enum ClientBody {
        Empty,
        Full {
            data: Option<Bytes>,
        },
        Streaming {
            #[pin]
            stream: Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>,
        },
    }
}

impl ClientBody {
    /// Create an empty body.
    pub fn empty() -> Self {
        ClientBody::Empty
    }

    /// Create a body holding `data`.
    pub fn full(data: impl Into<Bytes>) -> Self {
        ClientBody::Full {
            data: Some(data.into()),
        }
    }

    /// Create a body that forwards the chunks of `stream`.
    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        ClientBody::Streaming {
            stream: Box::pin(stream),
        }
    }
}

impl Body for ClientBody {
    type Data = Bytes;
    type Error = ClientError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            ClientBodyProj::Empty => Poll::Ready(None),
            ClientBodyProj::Full { data } => {
                Poll::Ready(data.take().filter(|d| !d.is_empty()).map(|d| Ok(Frame::data(d))))
            }
            ClientBodyProj::Streaming { stream } => stream
                .poll_next(cx)
                .map(|chunk| chunk.map(|res| res.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            ClientBody::Empty => true,
            ClientBody::Full { data } => data.as_ref().is_none_or(Bytes::is_empty),
            ClientBody::Streaming { .. } => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            ClientBody::Empty => SizeHint::with_exact(0),
            ClientBody::Full { data } => {
                SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64))
            }
            ClientBody::Streaming { .. } => SizeHint::default(),
        }
    }
}

impl Default for ClientBody {
    fn default() -> Self {
        ClientBody::Empty
    }
}

impl From<Bytes> for ClientBody {
    fn from(data: Bytes) -> Self {
        ClientBody::full(data)
    }
}

impl From<String> for ClientBody {
    fn from(data: String) -> Self {
        ClientBody::full(data)
    }
}

impl From<&'static str> for ClientBody {
    fn from(data: &'static str) -> Self {
        ClientBody::full(data)
    }
}

impl From<Vec<u8>> for ClientBody {
    fn from(data: Vec<u8>) -> Self {
        ClientBody::full(data)
    }
}

impl std::fmt::Debug for ClientBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientBody::Empty => write!(f, "ClientBody::Empty"),
            ClientBody::Full { data } => f
                .debug_struct("ClientBody::Full")
                .field("len", &data.as_ref().map(Bytes::len))
                .finish(),
            ClientBody::Streaming { .. } => write!(f, "ClientBody::Streaming"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_empty_body() {
        let body = ClientBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));

        let collected = body.collect().await.unwrap();
        assert!(collected.to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_full_body() {
        let body = ClientBody::from("{\"action\":\"git-upload-pack\"}");
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(28));

        let collected = body.collect().await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from("{\"action\":\"git-upload-pack\"}"));
    }

    #[tokio::test]
    async fn test_full_empty_bytes_is_end_stream() {
        let body = ClientBody::full(Vec::new());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_streaming_body() {
        let chunks = vec![Ok(Bytes::from("0032want ")), Ok(Bytes::from("0000"))];
        let body = ClientBody::streaming(futures::stream::iter(chunks));
        assert!(!body.is_end_stream());

        let collected = body.collect().await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from("0032want 0000"));
    }

    #[tokio::test]
    async fn test_streaming_body_error() {
        let chunks = vec![
            Ok(Bytes::from("partial")),
            Err(ClientError::Transport("source closed".into())),
        ];
        let body = ClientBody::streaming(futures::stream::iter(chunks));

        let err = body.collect().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
