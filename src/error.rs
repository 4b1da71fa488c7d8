//! Error types for Talos.
//!
//! The IndieAuth error taxonomy (spec.md §7) is a closed set of string
//! codes rendered either as query parameters on a redirect or as a JSON
//! body, never as an HTTP 5xx unless something on our side actually broke.
//! `IndieAuthError` carries that taxonomy; `Error` is the catch-all for
//! infrastructure/programmer failures (config, IO, storage, discovery).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The string error codes defined by spec.md §6 "Error taxonomy".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndieAuthErrorCode {
    InvalidRequest,
    UnsupportedResponseType,
    InvalidGrant,
    UnsupportedGrantType,
    #[allow(dead_code)]
    InvalidClient,
    AccessDenied,
    ServerError,
}

impl IndieAuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidClient => "invalid_client",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }
}

/// A client-visible IndieAuth error: either rendered as `?error=...` on a
/// redirect, or as a JSON body, depending on which endpoint produced it.
#[derive(Debug, Clone)]
pub struct IndieAuthError {
    pub code: IndieAuthErrorCode,
    pub description: String,
    /// Set when the request's `redirect_uri` could not be trusted (spec.md
    /// §4.9.1 steps 2–3) — callers MUST render an error page instead of
    /// redirecting to the submitted `redirect_uri` when this is true.
    pub redirect_uri_untrusted: bool,
}

impl IndieAuthError {
    pub fn new(code: IndieAuthErrorCode, description: impl Into<String>) -> Self {
        Self { code, description: description.into(), redirect_uri_untrusted: false }
    }

    pub fn untrusted_redirect(code: IndieAuthErrorCode, description: impl Into<String>) -> Self {
        Self { code, description: description.into(), redirect_uri_untrusted: true }
    }

    /// Serializes as the JSON token-error body (spec.md §6 "Token error").
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": self.code.as_str(),
            "error_description": self.description,
        })
    }
}

impl std::fmt::Display for IndieAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.description)
    }
}

impl std::error::Error for IndieAuthError {}

impl IntoResponse for IndieAuthError {
    fn into_response(self) -> Response {
        let status = match self.code {
            IndieAuthErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            IndieAuthErrorCode::AccessDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(self.to_json())).into_response()
    }
}

/// Infrastructure / programmer errors — never shown verbatim to clients.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("upstream provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Maps an internal failure onto the closest IndieAuth error code, per
    /// spec.md §7 ("Storage errors ... surfaced as server_error").
    pub fn into_indieauth_error(self) -> IndieAuthError {
        IndieAuthError::new(IndieAuthErrorCode::ServerError, self.to_string())
    }
}

#[derive(Serialize)]
struct UnauthorizedBody {
    error: &'static str,
}

/// HTTP 401 with no token metadata, per spec.md §4.9.10 / §7.
pub fn unauthorized_response() -> Response {
    (StatusCode::UNAUTHORIZED, Json(UnauthorizedBody { error: "unauthorized" })).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "internal error");
        self.into_indieauth_error().into_response()
    }
}
