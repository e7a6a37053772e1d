//! Per-request operation context threaded through the dispatch pipeline.

use std::fmt;
use std::sync::Arc;

use restkit_core::{OperationKind, RequestContext, ResponseMeta};
use serde_json::Value;

use crate::resource::Resource;

/// One CRUD request against one resource.
///
/// Created fresh by the setup stage for every HTTP request and moved through
/// pre-hooks, the handler and post-hooks by value: each step receives the
/// operation and hands back the (possibly updated) operation. The handler
/// assigns `result` exactly once; the render stage consumes it.
pub struct Operation {
    resource: Arc<Resource>,
    kind: OperationKind,
    request: RequestContext,
    response: ResponseMeta,
    id: Option<String>,
    payload: Option<Value>,
    result: Option<Value>,
}

impl Operation {
    /// Creates an operation with no id, payload or result.
    #[must_use]
    pub fn new(resource: Arc<Resource>, kind: OperationKind, request: RequestContext) -> Self {
        Self {
            resource,
            kind,
            request,
            response: ResponseMeta::default(),
            id: None,
            payload: None,
            result: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Assigns the handler result.
    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// The resource this operation targets.
    #[must_use]
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &ResponseMeta {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseMeta {
        &mut self.response
    }

    /// Overrides the status the render stage responds with on success.
    pub fn set_status(&mut self, status: u16) {
        self.response.set_status(status);
    }

    /// Instance id taken from the route (read, update, patch, remove).
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Parsed request body (create, update, patch).
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Value> {
        self.payload.as_mut()
    }

    /// The handler result, once dispatched.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn result_mut(&mut self) -> Option<&mut Value> {
        self.result.as_mut()
    }

    /// Whether a handler has assigned a result.
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.result.is_some()
    }

    /// Moves the result out for rendering.
    pub fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("resource", &self.resource.key())
            .field("kind", &self.kind)
            .field("request_id", &self.request.request_id)
            .field("id", &self.id)
            .field("has_payload", &self.payload.is_some())
            .field("dispatched", &self.result.is_some())
            .finish_non_exhaustive()
    }
}
