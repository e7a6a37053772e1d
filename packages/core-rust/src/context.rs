use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity attached to a request by upstream middleware.
///
/// An authentication layer inserts it into the HTTP request extensions and
/// the pipeline copies it into [`RequestContext::principal`]. No policy is
/// applied to it here; hooks may inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity.
    pub id: String,
    /// Roles assigned to this principal.
    pub roles: Vec<String>,
}

/// Owned snapshot of the inbound request, carried by every operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Correlation id (propagated from `x-request-id` when present).
    pub request_id: String,
    /// HTTP method, upper-case.
    pub method: String,
    /// Request path as received.
    pub path: String,
    /// Decoded query string parameters.
    pub query: BTreeMap<String, String>,
    /// Request headers with lower-cased names. Non UTF-8 values are dropped.
    pub headers: BTreeMap<String, String>,
    /// Authenticated principal, if any.
    pub principal: Option<Principal>,
}

impl RequestContext {
    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Outbound response handle owned by the operation.
///
/// Handlers and hooks record the status override and extra headers here; the
/// render stage applies them when it writes the response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    status: Option<u16>,
    headers: Vec<(String, String)>,
}

impl ResponseMeta {
    /// Overrides the success status (e.g. 201 for a completed create).
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// The status override, if one was set.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Appends a response header.
    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Headers recorded so far, in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}
