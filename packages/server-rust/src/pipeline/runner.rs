use std::time::Instant;

use axum::response::Response;
use tracing::{info, info_span, trace, Instrument};

use super::endpoint::{EndpointDescriptor, Stage};
use super::request::IncomingRequest;
use super::stages::{handle_errors, Flow};
use crate::telemetry::{OPERATIONS_TOTAL, OPERATION_DURATION_SECONDS};

/// Executes an endpoint's stage chain in order.
///
/// The first error skips every remaining stage up to [`Stage::HandleErrors`],
/// which turns it into the response. Stages after the error stage do not run.
pub(super) async fn run(endpoint: &EndpointDescriptor, request: IncomingRequest) -> Response {
    let resource = endpoint.resource();
    let kind = endpoint.kind();

    let span = info_span!(
        "operation",
        resource = %resource.key(),
        operation = kind.as_str(),
        request_id = %request.context.request_id,
        status = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    );

    async move {
        let start = Instant::now();
        let mut flow = Flow::new(request);
        let mut failure = None;

        for &stage in endpoint.stages() {
            if stage == Stage::HandleErrors {
                if let Some(err) = failure.take() {
                    return finish(handle_errors(resource, kind, &err), endpoint, start);
                }
                continue;
            }
            if failure.is_some() {
                continue;
            }
            trace!(stage = %stage, "running stage");
            if let Err(err) = flow.apply(stage, resource).await {
                failure = Some(err);
            }
        }

        let response = match failure {
            Some(err) => handle_errors(resource, kind, &err),
            None => flow.into_response(),
        };
        finish(response, endpoint, start)
    }
    .instrument(span)
    .await
}

fn finish(response: Response, endpoint: &EndpointDescriptor, start: Instant) -> Response {
    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    let resource = endpoint.resource().key().to_string();
    let operation = endpoint.kind().as_str();

    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = elapsed.as_millis() as u64;
    let span = tracing::Span::current();
    span.record("status", status);
    span.record("duration_ms", duration_ms);

    metrics::counter!(
        OPERATIONS_TOTAL,
        "resource" => resource.clone(),
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        OPERATION_DURATION_SECONDS,
        "resource" => resource,
        "operation" => operation
    )
    .record(elapsed.as_secs_f64());

    info!(status, duration_ms, "operation complete");
    response
}
