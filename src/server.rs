use crate::config::RelayConfig;
use crate::error::{HandlerError, RelayError};
use crate::logging::{AuditEntry, SharedLogger};
use crate::relay;
use crate::translate::gemini_types::GenerateContentRequest;
use crate::translate::request::RelayRequest;
use crate::translate::response::RelayReply;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CHAT_ROUTE: &str = "/api/gemini-chat";

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    /// Resolved once at startup. `None` makes every chat request fail as misconfigured.
    pub api_key: Option<String>,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // CorsLayer answers OPTIONS itself, so the chat route only gets the
    // allow-origin header and rejects every non-POST method in the handler.
    let chat = Router::new()
        .route(CHAT_ROUTE, any(handle_chat))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ));

    let health = Router::new()
        .route("/health", get(handle_health))
        .layer(cors);

    chat.merge(health)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Model and content count, known once the body has been translated.
struct RequestSummary {
    model: String,
    contents: usize,
}

async fn handle_chat(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    let mut summary = None;
    let (parts, body) = request.into_parts();
    let method = parts.method;

    let result = relay_chat(&state, &method, body, &mut summary).await;

    let mut entry = match &result {
        Ok(_) => AuditEntry::new(request_id, "ok", StatusCode::OK.as_u16()),
        Err(err) => {
            let entry = AuditEntry::new(request_id, err.outcome(), err.status().as_u16());
            match err {
                HandlerError::Unexpected(cause) => {
                    error!(%request_id, error = %cause, "Relay failed");
                    entry.with_detail(cause.to_string())
                }
                HandlerError::Upstream { status, .. } => {
                    entry.with_detail(format!("upstream status {status}"))
                }
                _ => {
                    warn!(%request_id, %method, "Rejected request: {}", err);
                    entry
                }
            }
        }
    };
    if let Some(RequestSummary { model, contents }) = summary {
        entry = entry.with_model(model, contents);
    }
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    state.logger.record_async(entry.with_elapsed_ms(elapsed_ms)).await;

    match result {
        Ok(reply) => {
            info!(%request_id, reply_len = reply.reply.len(), elapsed_ms, "Relay completed");
            (StatusCode::OK, Json(reply)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Validation gates run in order and short-circuit before any upstream call.
/// The body is only buffered once the method and key checks pass, and without
/// a size limit.
async fn relay_chat(
    state: &AppState,
    method: &Method,
    body: Body,
    summary: &mut Option<RequestSummary>,
) -> Result<RelayReply, HandlerError> {
    if *method != Method::POST {
        drain(body).await;
        return Err(HandlerError::MethodNotAllowed);
    }

    let Some(api_key) = state.api_key.as_deref() else {
        drain(body).await;
        return Err(HandlerError::ServerMisconfigured {
            env_var: state.config.upstream.api_key_env.clone(),
        });
    };

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| RelayError::other(format!("Failed to read request body: {e}")))?;
    let body: serde_json::Value = serde_json::from_slice(&body)?;
    if body.is_null() {
        return Err(RelayError::other("request body is JSON null").into());
    }

    let req = RelayRequest::from_value(&body);
    let contents = req.contents();
    if contents.is_empty() {
        return Err(HandlerError::InvalidInput);
    }

    let model = req.target_model(&state.config.upstream.default_model).to_string();
    *summary = Some(RequestSummary {
        model: model.clone(),
        contents: contents.len(),
    });

    let upstream_req = GenerateContentRequest { contents };
    relay::generate_content(&upstream_req, &model, api_key, &state.config, &state.client).await
}

/// Discard an unread body chunk by chunk so the client gets the response
/// rather than a connection reset.
async fn drain(body: Body) {
    let mut stream = body.into_data_stream();
    while let Some(Ok(_)) = stream.next().await {}
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
