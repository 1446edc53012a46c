#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use gemini_relay::config::RelayConfig;
use gemini_relay::{build_router, AppState, SharedLogger};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A request the stub upstream received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub query: Option<String>,
    pub body: serde_json::Value,
}

/// Fake Gemini endpoint that answers every request with a canned response.
#[derive(Clone)]
pub struct UpstreamStub {
    base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: Bytes,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl UpstreamStub {
    pub async fn start(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status,
            body: body.into(),
            calls: calls.clone(),
        };

        let router = Router::new()
            .fallback(stub_handler)
            .layer(DefaultBodyLimit::disable())
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub upstream");
        let addr = listener.local_addr().expect("stub upstream local addr");

        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                eprintln!("Stub upstream error: {err:?}");
            }
        });

        Self {
            base_url: format!("http://{addr}/v1beta"),
            calls,
        }
    }

    pub async fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self::start(status, body.to_string()).await
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock stub calls").clone()
    }
}

async fn stub_handler(State(state): State<StubState>, uri: Uri, body: Bytes) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    state.calls.lock().expect("lock stub calls").push(RecordedCall {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    });
    (state.status, state.body.clone()).into_response()
}

/// The relay router bound to an ephemeral port.
pub struct TestRelay {
    pub base_url: String,
    pub logger: SharedLogger,
    pub log_dir: TempDir,
    client: reqwest::Client,
}

impl TestRelay {
    pub async fn start(upstream_base_url: &str, api_key: Option<&str>) -> Self {
        let mut config = RelayConfig::default();
        config.port = 0;
        config.upstream.base_url = upstream_base_url.to_string();

        let log_dir = tempfile::tempdir().expect("temp log dir");
        let logger = SharedLogger::new(log_dir.path().join("relay.log")).expect("audit log");
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client");

        let state = Arc::new(AppState {
            config,
            api_key: api_key.map(str::to_string),
            client: client.clone(),
            logger: logger.clone(),
        });

        let app = build_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
        let addr = listener.local_addr().expect("relay local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("relay server");
        });

        Self {
            base_url: format!("http://{addr}"),
            logger,
            log_dir,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json(&self, body: &serde_json::Value) -> reqwest::Response {
        self.post_raw(body.to_string()).await
    }

    pub async fn post_raw(&self, body: impl Into<reqwest::Body>) -> reqwest::Response {
        self.client
            .post(self.url(gemini_relay::server::CHAT_ROUTE))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("relay request")
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

pub fn gemini_reply(parts: &[&str]) -> serde_json::Value {
    let parts: Vec<_> = parts.iter().map(|t| serde_json::json!({ "text": t })).collect();
    serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": parts }, "finishReason": "STOP" }],
        "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 2 }
    })
}
