//! Error types for the Sync2 server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::sync::PeerRole;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a single push, pull or relay operation
#[derive(Error, Debug)]
pub enum SyncError {
    /// The peer answered with a client or server error
    #[error("Object posting error. Code: {status}. Details: \n{body}")]
    Transport { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Client profile '{client}' does not support category '{category}'")]
    UnsupportedCategory { client: String, category: String },

    #[error("Unknown client profile: {0}")]
    UnknownClient(String),

    #[error("Missing credentials for the {0} instance")]
    MissingCredentials(PeerRole),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Envelope and body reconstruction errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Body is not a JSON object, cannot reconstruct {0}")]
    NotAnObject(&'static str),

    #[error("Expected resource type {expected}, found {found}")]
    UnexpectedResourceType { expected: &'static str, found: String },

    #[error("Invalid date '{0}'")]
    InvalidDate(String),
}

impl SyncError {
    /// Whether the error stems from configuration rather than the peer
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownCategory(_)
                | SyncError::UnsupportedCategory { .. }
                | SyncError::UnknownClient(_)
                | SyncError::MissingCredentials(_)
                | SyncError::MissingConfiguration(_)
        )
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Sync(e) => {
                tracing::error!("Sync error: {}", e);
                match e {
                    SyncError::Transport { status, body } => (
                        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                        "peer_error",
                        body.clone(),
                    ),
                    SyncError::Network(_) => (
                        StatusCode::BAD_GATEWAY,
                        "network_error",
                        "Peer instance unreachable".to_string(),
                    ),
                    SyncError::Codec(_) => (
                        StatusCode::NOT_FOUND,
                        "not_found",
                        "The entity doesn't exists".to_string(),
                    ),
                    SyncError::InvalidPayload(_) | SyncError::InvalidUrl { .. } => (
                        StatusCode::BAD_REQUEST,
                        "bad_request",
                        e.to_string(),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "sync_error",
                        e.to_string(),
                    ),
                }
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Json(e) => (StatusCode::BAD_REQUEST, "parse_error", e.to_string()),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        });

        (status, body).into_response()
    }
}
