//! Endpoint descriptors and the stage chain every routed request runs through:
//! parse body, set up the operation, validate the payload, dispatch, render,
//! and map errors.

mod endpoint;
mod request;
mod runner;
mod stages;

pub use endpoint::{build_endpoints, EndpointDescriptor, Stage};
pub use request::IncomingRequest;
