//! Conflict resolution endpoint

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::sync::{ResolutionOutcome, AUDIT_LIST_URL};

/// Create the conflict router
pub fn router() -> Router<AppState> {
    Router::new().route("/resolve", post(resolve_conflict))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveQuery {
    pub conflict_uuid: String,
}

/// Force-push the operator's representation for an open conflict
async fn resolve_conflict(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
    body: String,
) -> Result<Response> {
    match state.resolver().resolve(&query.conflict_uuid, &body).await? {
        ResolutionOutcome::Accepted(_) => {
            Ok((StatusCode::ACCEPTED, Json(json!({ "url": AUDIT_LIST_URL }))).into_response())
        }
        ResolutionOutcome::Failed(audit) => {
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(audit)).into_response())
        }
        ResolutionOutcome::Malformed(reason) => Err(AppError::BadRequest(reason)),
        ResolutionOutcome::NotFound => Err(AppError::NotFound(format!(
            "Conflict not found: {}",
            query.conflict_uuid
        ))),
        ResolutionOutcome::AlreadyResolved => Err(AppError::Conflict(format!(
            "Conflict already resolved: {}",
            query.conflict_uuid
        ))),
    }
}
