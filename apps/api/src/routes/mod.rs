pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::typeset::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health_handler))
        .route("/readyz", get(health::readiness_handler))
        // Compile API
        .route("/api/latex/compile", post(handlers::handle_compile))
        .with_state(state)
}
