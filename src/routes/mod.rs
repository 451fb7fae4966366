//! Route modules for the Sync2 server

pub mod audit;
pub mod conflict;
pub mod health;
pub mod sync2;

use axum::Router;

use crate::state::AppState;

/// Every endpoint, bound to `state`
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/sync2", sync2::router())
        .nest("/rest/sync2/conflict", conflict::router())
        .nest("/rest/sync2/audit", audit::router())
        .with_state(state)
}
