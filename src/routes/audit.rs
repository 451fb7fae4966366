//! Audit trail endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::audit::{AuditMessage, AuditStore};
use crate::error::{AppError, Result};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

/// Create the audit router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit))
        .route("/:id", get(get_audit))
        .route("/:id/chain", get(get_chain))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// Most recent audit messages first
async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AuditMessage>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(state.audit().list(limit).await?))
}

async fn get_audit(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<AuditMessage>> {
    state
        .audit()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Audit message not found: {}", id)))
}

/// The message followed by its resolution attempts
async fn get_chain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditMessage>>> {
    let chain = state.audit().chain(&id).await?;
    if chain.is_empty() {
        return Err(AppError::NotFound(format!("Audit message not found: {}", id)));
    }
    Ok(Json(chain))
}
