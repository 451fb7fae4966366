//! Receiving sync2 endpoints
//!
//! Peers POST envelopes here; the inner request is replayed against the local
//! record API.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

use crate::error::{AppError, Result, SyncError};
use crate::state::AppState;
use crate::sync::{Envelope, RelayEndpoint};

/// Create the sync2 router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get", post(receive_get))
        .route("/post", post(receive_post))
        .route("/put", post(receive_put))
        .route("/delete", post(receive_delete))
}

async fn receive_get(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    receive(&state, RelayEndpoint::Get, &headers, &body).await
}

async fn receive_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    receive(&state, RelayEndpoint::Post, &headers, &body).await
}

async fn receive_put(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    receive(&state, RelayEndpoint::Put, &headers, &body).await
}

async fn receive_delete(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    receive(&state, RelayEndpoint::Delete, &headers, &body).await
}

async fn receive(state: &AppState, endpoint: RelayEndpoint, headers: &HeaderMap, body: &[u8]) -> Result<Response> {
    let envelope = Envelope::decode(body).map_err(SyncError::from)?;
    let relay = state.relay();

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let user = relay.authenticated_user(authorization)?;
    if !relay.is_request_authenticated(user.as_deref(), &envelope) {
        tracing::warn!(
            "Refused sync2 {} from instance {}",
            endpoint.as_str(),
            envelope.instance_id
        );
        return Err(AppError::Unauthorized(
            "Request is not authenticated".to_string(),
        ));
    }

    if !relay.is_local_target(&envelope.request.url) {
        return Err(AppError::Forbidden(format!(
            "{} is not served by this instance",
            envelope.request.url
        )));
    }

    let response = relay.relay(endpoint, &envelope).await?;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response())
}
