use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /healthz
/// Liveness probe: returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "keju-api"
    }))
}

/// GET /readyz
/// Readiness probe: reports whether the typesetting toolchain can be
/// resolved, since compile requests fail without it.
pub async fn readiness_handler(State(state): State<AppState>) -> Json<Value> {
    let toolchain_ready = state.toolchain.locate().is_some();
    Json(json!({
        "status": if toolchain_ready { "ready" } else { "not_ready" },
        "checks": {
            "toolchain": toolchain_ready
        }
    }))
}
