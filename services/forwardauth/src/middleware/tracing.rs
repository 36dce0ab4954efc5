//! Tracing Tower Layer
//!
//! Opens one span per inbound request carrying a correlation id, and logs the
//! completion status and latency.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::{Request, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{Instrument, info_span};
use uuid::Uuid;

/// Tracing layer for Tower
#[derive(Debug, Clone)]
pub struct TracingLayer {
    service_name: &'static str,
}

impl TracingLayer {
    /// Creates a new tracing layer
    #[must_use]
    pub const fn new(service_name: &'static str) -> Self {
        Self { service_name }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            service_name: self.service_name,
        }
    }
}

/// Tracing service wrapper
#[derive(Debug, Clone)]
pub struct TracingService<S> {
    inner: S,
    service_name: &'static str,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let correlation_id = Uuid::new_v4();
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let span = info_span!(
            "request",
            service = self.service_name,
            correlation_id = %correlation_id,
            method = %req.method(),
            path = req.uri().path(),
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;
                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => {
                        tracing::info!(
                            status = response.status().as_u16(),
                            latency_ms,
                            "Request completed"
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            error_type = std::any::type_name::<S::Error>(),
                            latency_ms,
                            "Request failed"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
