//! Fallback handler routing requests into the endpoint registry.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::network::RouteMatch;
use crate::pipeline::IncomingRequest;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Matches the request against the registered endpoints and runs the
/// matching endpoint's stage chain.
///
/// Unknown paths answer 404 `route.not.found`; known paths under another
/// method answer 405 with an `Allow` header. While draining, 503.
pub async fn api_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    if !state.status.phase().accepts_requests() {
        return error(StatusCode::SERVICE_UNAVAILABLE, "server.unavailable");
    }
    let _in_flight = state.status.track();

    let (parts, body) = request.into_parts();
    let (endpoint, params) = match state.endpoints.match_route(&parts.method, parts.uri.path()) {
        RouteMatch::Found { endpoint, params } => (endpoint, params),
        RouteMatch::MethodNotAllowed { allowed } => {
            let allow = allowed
                .iter()
                .map(axum::http::Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = error(StatusCode::METHOD_NOT_ALLOWED, "method.not.allowed");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            return response;
        }
        RouteMatch::NotFound => {
            debug!(method = %parts.method, path = %parts.uri.path(), "no route");
            return error(StatusCode::NOT_FOUND, "route.not.found");
        }
    };

    let bytes = match axum::body::to_bytes(body, state.config.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "request body rejected");
            return error(StatusCode::PAYLOAD_TOO_LARGE, "payload.too.large");
        }
    };

    let incoming = IncomingRequest::from_parts(&parts, bytes).with_params(params);
    endpoint.execute(incoming).await
}
