use std::fmt;
use std::sync::Arc;

use axum::response::Response;
use http::Method;
use restkit_core::OperationKind;

use super::request::IncomingRequest;
use super::runner;
use crate::resource::Resource;

/// One step of an endpoint's stage chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Decode the JSON body into the operation payload.
    ParseBody,
    /// Build the operation for this kind from the request.
    Setup(OperationKind),
    /// Check the payload against the resource's schema.
    ValidatePayload(OperationKind),
    /// Hand the operation to the resource's entry point for its kind.
    Dispatch,
    /// Turn the operation result into the response.
    Render,
    /// Map the first error raised by any earlier stage to a response.
    HandleErrors,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseBody => f.write_str("parse_body"),
            Self::Setup(kind) => write!(f, "setup({kind})"),
            Self::ValidatePayload(kind) => write!(f, "validate_payload({kind})"),
            Self::Dispatch => f.write_str("dispatch"),
            Self::Render => f.write_str("render"),
            Self::HandleErrors => f.write_str("handle_errors"),
        }
    }
}

/// Route descriptor produced for one (resource, operation kind) pair.
#[derive(Clone)]
pub struct EndpointDescriptor {
    kind: OperationKind,
    method: Method,
    path: String,
    stages: Vec<Stage>,
    resource: Arc<Resource>,
}

impl EndpointDescriptor {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Route pattern, `:id` marking the instance segment.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// Runs the stage chain against a routed request.
    pub async fn execute(&self, request: IncomingRequest) -> Response {
        runner::run(self, request).await
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("resource", &self.resource.key())
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("stages", &self.stages)
            .finish()
    }
}

fn method_for(kind: OperationKind) -> Method {
    match kind {
        OperationKind::Read | OperationKind::List => Method::GET,
        OperationKind::Create => Method::POST,
        OperationKind::Update => Method::PUT,
        OperationKind::Patch => Method::PATCH,
        OperationKind::Remove => Method::DELETE,
    }
}

/// The six descriptors of a resource, in [`OperationKind::ALL`] order.
///
/// Kinds that carry a payload parse the body first; when the resource
/// declares a schema they also validate it before dispatch.
#[must_use]
pub fn build_endpoints(resource: &Arc<Resource>) -> Vec<EndpointDescriptor> {
    let segment = resource.segment();
    OperationKind::ALL
        .into_iter()
        .map(|kind| {
            let path = if kind.requires_id() {
                format!("/{segment}/:id")
            } else {
                format!("/{segment}")
            };

            let mut stages = Vec::with_capacity(6);
            if kind.carries_payload() {
                stages.push(Stage::ParseBody);
            }
            stages.push(Stage::Setup(kind));
            if kind.carries_payload() && resource.has_schema() {
                stages.push(Stage::ValidatePayload(kind));
            }
            stages.extend([Stage::Dispatch, Stage::Render, Stage::HandleErrors]);

            EndpointDescriptor {
                kind,
                method: method_for(kind),
                path,
                stages,
                resource: Arc::clone(resource),
            }
        })
        .collect()
}
