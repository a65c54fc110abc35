//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Body, http::HeaderMap, routing::get, Router};
use conn_recycler::client::wants_close;
use conn_recycler::RecycleService;
use http::{Request, Response, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    /// One entry per request received: did it ask for `Connection: close`?
    pub close_requests: Arc<Mutex<Vec<bool>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn close_requests(&self) -> Vec<bool> {
        self.close_requests.lock().unwrap().clone()
    }
}

/// Start a keep-alive backend that answers every request after `delay`.
pub async fn start_mock_backend(delay: Duration) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let close_requests = Arc::new(Mutex::new(Vec::new()));

    let seen = close_requests.clone();
    let app = Router::new().route(
        "/",
        get(move |headers: HeaderMap| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(wants_close(&headers));
                tokio::time::sleep(delay).await;
                "ok"
            }
        }),
    );

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, close_requests }
}

pub fn http_client() -> Client<HttpConnector, Body> {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Send a GET through `service` and drain the body.
#[allow(dead_code)]
pub async fn get_through(service: &RecycleService<Client<HttpConnector, Body>>, url: &str) -> StatusCode {
    let request = Request::get(url).body(Body::empty()).unwrap();
    let response: Response<_> = service.clone().oneshot(request).await.expect("backend unreachable");
    let status = response.status();
    axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
        .await
        .unwrap();
    status
}
