//! Tower middleware that recycles connections to slow hosts.
//!
//! # Responsibilities
//! - Resolve the target host of each outgoing request
//! - Run the latency hook events around the inner client call
//! - Add `Connection: close` to requests bound for hosts in Closing
//!
//! # Design Decisions
//! - Wraps any `Service<Request<B>>`, so it sits in front of a hyper-util
//!   legacy client or any other tower-compatible HTTP client
//! - One service call is one attempt; callers that retry go through the
//!   service again
//! - A failed call counts as a closed connection

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{header, uri::Authority, HeaderMap, HeaderValue, Request, Response};
use tower::{Layer, Service};

use crate::error::Result;
use crate::hook::{Event, Execution, LatencyHandler};
use crate::latency::{HostRegistry, MachineConfig};

/// Layer producing [`RecycleService`]s that share one host registry.
#[derive(Debug, Clone)]
pub struct RecycleLayer {
    handler: LatencyHandler,
}

impl RecycleLayer {
    /// Create a layer with its own registry.
    pub fn new(config: MachineConfig) -> Result<Self> {
        let registry = HostRegistry::new(config)?;
        Ok(Self::with_registry(Arc::new(registry)))
    }

    /// Create a layer over an existing registry.
    pub fn with_registry(registry: Arc<HostRegistry>) -> Self {
        Self {
            handler: LatencyHandler::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<HostRegistry> {
        self.handler.registry()
    }
}

impl<S> Layer<S> for RecycleLayer {
    type Service = RecycleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecycleService {
            inner,
            handler: self.handler.clone(),
        }
    }
}

/// HTTP client service that feeds per-host latency machines.
#[derive(Debug, Clone)]
pub struct RecycleService<S> {
    inner: S,
    handler: LatencyHandler,
}

impl<S> RecycleService<S> {
    pub fn registry(&self) -> &Arc<HostRegistry> {
        self.handler.registry()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, B, R> Service<Request<B>> for RecycleService<S>
where
    S: Service<Request<B>, Response = Response<R>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
{
    type Response = Response<R>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        // The ready service is the one that must handle the call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let handler = self.handler.clone();

        let mut execution = Execution::new(request_host(&request));
        handler.handle(Event::BeforeExecutionStart, &mut execution);
        handler.handle(Event::BeforeAttempt, &mut execution);

        if execution.close() {
            request
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        } else if wants_close(request.headers()) {
            execution.set_close(true);
        }

        Box::pin(async move {
            let result = inner.call(request).await;
            let closed = match &result {
                Ok(response) => wants_close(response.headers()),
                Err(_) => true,
            };
            if closed {
                execution.set_close(true);
            }
            handler.handle(Event::AfterAttempt, &mut execution);
            result
        })
    }
}

/// Host a request is bound for: the URI host, else the `Host` header
/// without its port.
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    if let Some(host) = request.uri().host() {
        return Some(host.to_owned());
    }

    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Authority::from_str(v).ok())
        .map(|authority| authority.host().to_owned())
}

/// True if the `Connection` header carries the `close` token.
pub fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("close"))
}
