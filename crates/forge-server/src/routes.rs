//! Route table: the JSON-RPC endpoint plus the two plain-HTTP metadata
//! endpoints named in §6.

use crate::handlers;
use crate::server::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::rpc))
        .route("/.well-known/agent.json", get(handlers::agent_card))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
