//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The `watch` command serves a small local API next to the scheduler: the
//! editor host posts paste events here, and the plan/report/settings
//! endpoints expose what the renamer sees without touching any file.

pub mod rename;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the API router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/paste", post(rename::paste))
        .route("/api/plan", get(rename::plan))
        .route("/api/report", get(rename::report))
        .route("/api/settings", get(rename::settings))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
