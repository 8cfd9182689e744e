//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use tokio::net::TcpListener;

use smaran::openai::ApiClient;
use smaran::{DbPool, KeyStore, db};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// API client for `base_url` with a fixed environment key
pub fn test_api(base_url: &str, key: &str) -> ApiClient {
    ApiClient::new(base_url, KeyStore::in_memory(Some(key)))
}

/// One scripted HTTP response
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    /// Body chunks; streamed with a pause in between unless `sized`
    pub parts: Vec<Vec<u8>>,
    /// Send the body in one piece with a `Content-Length`
    pub sized: bool,
}

impl CannedResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            parts: vec![body.to_string().into_bytes()],
            sized: true,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            parts: vec![body.as_bytes().to_vec()],
            sized: true,
        }
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "audio/mpeg",
            parts: vec![body],
            sized: true,
        }
    }

    /// Event stream, one network write per part
    pub fn sse<S: AsRef<str>>(parts: &[S]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            parts: parts.iter().map(|p| p.as_ref().as_bytes().to_vec()).collect(),
            sized: false,
        }
    }
}

/// `data:` line carrying one completion delta
pub fn sse_delta(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

/// A request as seen by the server
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is json")
    }
}

#[derive(Default)]
struct ServerState {
    responses: Mutex<VecDeque<CannedResponse>>,
    requests: Mutex<Vec<CapturedRequest>>,
}

/// Local HTTP server answering each request with the next canned response
pub struct CannedServer {
    pub base_url: String,
    state: Arc<ServerState>,
}

impl CannedServer {
    pub async fn start(responses: Vec<CannedResponse>) -> Self {
        let state = Arc::new(ServerState {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        });
        let app = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}/v1"),
            state,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn respond(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(CapturedRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });

    let Some(canned) = state.responses.lock().unwrap().pop_front() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no canned response left").into_response();
    };
    let status = StatusCode::from_u16(canned.status).expect("valid status");

    let body = if canned.sized {
        Body::from(canned.parts.concat())
    } else {
        let chunks = futures::stream::iter(canned.parts).then(|part| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, std::io::Error>(part)
        });
        Body::from_stream(chunks)
    };

    (status, [(header::CONTENT_TYPE, canned.content_type)], body).into_response()
}
