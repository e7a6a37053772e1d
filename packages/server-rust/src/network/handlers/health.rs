//! Health, liveness and readiness checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::ServerPhase;
use crate::resource::InitState;

/// Server phase plus each resource's initialization state.
///
/// Always 200; the body says whether the server is actually serving.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let resources: Vec<Value> = state
        .resources
        .resources()
        .iter()
        .map(|resource| {
            let init = resource.state();
            let mut entry = json!({
                "key": resource.key(),
                "path": format!("/{}", resource.segment()),
                "state": init.as_str(),
            });
            if let InitState::Failed(message) = &init {
                entry["error"] = json!(message.as_ref());
            }
            entry
        })
        .collect();

    Json(json!({
        "state": state.status.phase().as_str(),
        "in_flight": state.status.in_flight(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "routes": state.endpoints.len(),
        "resources": resources,
    }))
}

/// Liveness: the process answers. Always 200.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness: 200 once the server is ready and no resource has failed to
/// initialize, 503 otherwise.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    let failed = state
        .resources
        .resources()
        .iter()
        .any(|r| matches!(r.state(), InitState::Failed(_)));
    if state.status.phase() == ServerPhase::Ready && !failed {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
