use std::collections::BTreeMap;

use axum::extract::Query;
use bytes::Bytes;
use http::request::Parts;
use restkit_core::{Principal, RequestContext};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// A routed request as the pipeline sees it: the request snapshot, the
/// path parameters the route matched, and the raw body.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub context: RequestContext,
    pub params: BTreeMap<String, String>,
    pub body: Bytes,
}

impl IncomingRequest {
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            params: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Snapshots the head of an HTTP request.
    ///
    /// Header names are lower-cased and values that are not valid UTF-8 are
    /// dropped. The request id comes from `x-request-id` (set by the
    /// request-id layer) or is generated here. A [`Principal`] placed in the
    /// request extensions by an authentication layer becomes the context's
    /// principal.
    #[must_use]
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let headers: BTreeMap<String, String> = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .cloned()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let query = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        Self {
            context: RequestContext {
                request_id,
                method: parts.method.as_str().to_string(),
                path: parts.uri.path().to_string(),
                query,
                headers,
                principal: parts.extensions.get::<Principal>().cloned(),
            },
            params: BTreeMap::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Whether the body should be parsed as JSON: no content type, or any
    /// `application/json` / `+json` media type.
    #[must_use]
    pub fn is_json(&self) -> bool {
        match self.context.header("content-type") {
            None => true,
            Some(value) => {
                let media = value
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                media == "application/json" || media.ends_with("+json")
            }
        }
    }
}
