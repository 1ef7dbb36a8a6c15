//! Whole-request deadline.
//!
//! [`DeadlineLayer`] fixes a deadline when a request is issued. The same
//! deadline bounds connecting, sending the request, waiting for the response
//! head and reading the response body: the body is handed out as a
//! [`TimeoutBody`] that fails with [`ClientError::Timeout`] once the deadline
//! passes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use tokio::time::{Instant, Sleep};
use tower::{BoxError, Layer, Service};

use crate::ClientError;

/// Layer that bounds each request, body included, by `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineLayer {
    timeout: Duration,
}

impl DeadlineLayer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService {
            inner,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeadlineService<S> {
    inner: S,
    timeout: Duration,
}

impl<S, B, ResB> Service<Request<B>> for DeadlineService<S>
where
    S: Service<Request<B>, Response = Response<ResB>>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    ResB: Send + 'static,
{
    type Response = Response<TimeoutBody<ResB>>;
    type Error = ClientError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, ClientError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|err| ClientError::from_boxed(err.into()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;
        let response = self.inner.call(req);
        Box::pin(async move {
            match tokio::time::timeout_at(deadline, response).await {
                Ok(Ok(res)) => Ok(res.map(|body| TimeoutBody::new(body, deadline, timeout))),
                Ok(Err(err)) => Err(ClientError::from_boxed(err.into())),
                Err(_elapsed) => Err(ClientError::Timeout(timeout)),
            }
        })
    }
}

pin_project! {
    /// A response body that fails once the request deadline has passed.
    pub struct TimeoutBody<B> {
        #[pin]
        inner: B,
        sleep: Pin<Box<Sleep>>,
        timeout: Duration,
    }
}

impl<B> TimeoutBody<B> {
    /// Wrap `inner`, failing with `Timeout(timeout)` at `deadline`.
    pub fn new(inner: B, deadline: Instant, timeout: Duration) -> Self {
        Self {
            inner,
            sleep: Box::pin(tokio::time::sleep_until(deadline)),
            timeout,
        }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B> Body for TimeoutBody<B>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    type Data = B::Data;
    type Error = ClientError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        if this.sleep.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Some(Err(ClientError::Timeout(*this.timeout))));
        }
        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Err(err))) => {
                Poll::Ready(Some(Err(ClientError::from_boxed(err.into()))))
            }
            Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> std::fmt::Debug for TimeoutBody<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutBody")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full, StreamBody};
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    fn stalled_body() -> StreamBody<
        futures::stream::BoxStream<'static, Result<Frame<Bytes>, Infallible>>,
    > {
        let first = futures::stream::iter([Ok(Frame::data(Bytes::from("abc")))]);
        let stream = futures::StreamExt::chain(first, futures::stream::pending());
        StreamBody::new(futures::StreamExt::boxed(stream))
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_fails_after_deadline() {
        let body = TimeoutBody::new(
            stalled_body(),
            Instant::now() + Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let err = body.collect().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_completes_before_deadline() {
        let body = TimeoutBody::new(
            Full::new(Bytes::from("done")),
            Instant::now() + Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let collected = body.collect().await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_shared_by_head_and_body() {
        let svc = DeadlineLayer::new(Duration::from_secs(2)).layer(service_fn(
            |_req: Request<()>| async {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                Ok::<_, Infallible>(Response::new(stalled_body()))
            },
        ));

        let res = svc.oneshot(Request::new(())).await.unwrap();
        let started = Instant::now();
        let err = res.into_body().collect().await.unwrap_err();
        assert!(err.is_timeout());
        // Only the remainder of the deadline is left for the body.
        assert!(started.elapsed() <= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_head_times_out() {
        let svc = DeadlineLayer::new(Duration::from_secs(1)).layer(service_fn(
            |_req: Request<()>| async {
                std::future::pending::<()>().await;
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::new())))
            },
        ));

        let err = svc.oneshot(Request::new(())).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_inner_error_is_transport() {
        let svc = DeadlineLayer::new(Duration::from_secs(1)).layer(service_fn(
            |_req: Request<()>| async {
                Err::<Response<Full<Bytes>>, _>(std::io::Error::other("connection refused"))
            },
        ));

        let err = svc.oneshot(Request::new(())).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(msg) if msg == "connection refused"));
    }
}
