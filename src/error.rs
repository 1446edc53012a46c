//! Error types for the relay.
//!
//! [`RelayError`] covers service-level failures (config, I/O, HTTP, JSON).
//! [`HandlerError`] is the per-request outcome taxonomy; every variant renders
//! to a fixed status and JSON body.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";
pub const INVALID_INPUT_MESSAGE: &str = "messages array is required";
pub const UPSTREAM_ERROR_MESSAGE: &str = "Upstream error";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error";

/// Why a relay request did not produce a reply.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("server is not configured with {env_var}")]
    ServerMisconfigured { env_var: String },

    #[error("no usable messages in request")]
    InvalidInput,

    /// Non-success status from the upstream API. `body` is relayed verbatim.
    #[error("upstream returned status {status}")]
    Upstream { status: StatusCode, body: Bytes },

    #[error("unexpected error: {0}")]
    Unexpected(#[source] RelayError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ServerMisconfigured { .. } | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
        }
    }

    /// Short label recorded in the audit log.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::ServerMisconfigured { .. } => "server_misconfigured",
            Self::InvalidInput => "invalid_input",
            Self::Upstream { .. } => "upstream_error",
            Self::Unexpected(_) => "unexpected_error",
        }
    }

    /// The body sent to the caller. Never includes the cause of `Unexpected`.
    pub fn body(&self) -> Bytes {
        match self {
            Self::MethodNotAllowed => error_body(METHOD_NOT_ALLOWED_MESSAGE),
            Self::ServerMisconfigured { env_var } => {
                error_body(&format!("Server is not configured with {env_var}"))
            }
            Self::InvalidInput => error_body(INVALID_INPUT_MESSAGE),
            Self::Upstream { body, .. } if !body.is_empty() => body.clone(),
            Self::Upstream { .. } => error_body(UPSTREAM_ERROR_MESSAGE),
            Self::Unexpected(_) => error_body(UNEXPECTED_ERROR_MESSAGE),
        }
    }
}

impl From<RelayError> for HandlerError {
    fn from(err: RelayError) -> Self {
        Self::Unexpected(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(RelayError::Json(err))
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        json_response(self.status(), self.body())
    }
}

/// Build a response whose body is already JSON text.
pub fn json_response(status: StatusCode, body: impl Into<Body>) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn error_body(message: &str) -> Bytes {
    Bytes::from(serde_json::json!({ "error": message }).to_string())
}
