//! Transport-level Tower layers applied to every request.

use axum::http::header::{HeaderName, ACCEPT, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Every verb an endpoint descriptor can be registered under.
const ENDPOINT_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Wraps `router` in the HTTP layers.
///
/// Outermost first: request id assignment, tracing, gzip compression, CORS,
/// the request timeout (408), and request id propagation to the response.
/// The request id is set before tracing so the span and the
/// [`RequestContext`](restkit_core::RequestContext) see the same id.
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let x_request_id = HeaderName::from_static("x-request-id");

    // `Router::layer` wraps what is already there, so the innermost goes first.
    router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors_layer(&config.cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}

/// `"*"` allows any origin; otherwise only the parseable listed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(ENDPOINT_METHODS)
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static("x-request-id")])
        .expose_headers([HeaderName::from_static("x-request-id")])
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let router = with_http_layers(Router::new().route("/", get(|| async { "ok" })), &NetworkConfig::default());
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn preflight_allows_every_endpoint_verb() {
        let config = NetworkConfig {
            cors_origins: vec!["https://example.com".to_string()],
            ..NetworkConfig::default()
        };
        let router = with_http_layers(Router::new().route("/", get(|| async { "ok" })), &config);
        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header("origin", "https://example.com")
                    .header("access-control-request-method", "PATCH")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let allowed = response
            .headers()
            .get("access-control-allow-methods")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        for verb in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            assert!(allowed.contains(verb), "{allowed}");
        }
    }
}
