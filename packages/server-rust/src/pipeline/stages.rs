//! Stage bodies. Each stage reads and writes the per-request [`Flow`].

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use restkit_core::{DispatchError, DispatchResult, OperationKind, ResponseMeta, GENERAL_ERROR};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::endpoint::Stage;
use super::request::IncomingRequest;
use crate::resource::Resource;
use crate::service::Operation;

/// State carried from one stage to the next for a single request.
pub(super) struct Flow {
    request: IncomingRequest,
    payload: Option<Value>,
    op: Option<Operation>,
    response: Option<Response>,
}

impl Flow {
    pub(super) fn new(request: IncomingRequest) -> Self {
        Self {
            request,
            payload: None,
            op: None,
            response: None,
        }
    }

    /// Runs one stage. [`Stage::HandleErrors`] is driven by the runner.
    pub(super) async fn apply(&mut self, stage: Stage, resource: &Arc<Resource>) -> DispatchResult<()> {
        match stage {
            Stage::ParseBody => {
                self.payload = parse_body(&self.request)?;
            }
            Stage::Setup(kind) => {
                self.op = Some(setup(resource, kind, &self.request, self.payload.take())?);
            }
            Stage::ValidatePayload(kind) => {
                if let Some(op) = &self.op {
                    validate_payload(resource, kind, op).await?;
                }
            }
            Stage::Dispatch => {
                if let Some(op) = self.op.take() {
                    self.op = Some(resource.dispatch(op).await?);
                }
            }
            Stage::Render => {
                if let Some(op) = self.op.take() {
                    self.response = Some(render(resource, op));
                }
            }
            Stage::HandleErrors => {}
        }
        Ok(())
    }

    /// The rendered response, or an empty 200 when nothing rendered.
    pub(super) fn into_response(self) -> Response {
        self.response
            .unwrap_or_else(|| StatusCode::OK.into_response())
    }
}

/// Decodes a JSON body. Empty and non-JSON bodies leave the payload unset.
fn parse_body(request: &IncomingRequest) -> DispatchResult<Option<Value>> {
    if request.body.iter().all(u8::is_ascii_whitespace) || !request.is_json() {
        return Ok(None);
    }
    serde_json::from_slice(&request.body)
        .map(Some)
        .map_err(|e| DispatchError::validation("invalid.json", Some(json!(e.to_string()))))
}

fn setup(
    resource: &Arc<Resource>,
    kind: OperationKind,
    request: &IncomingRequest,
    payload: Option<Value>,
) -> DispatchResult<Operation> {
    let mut op = Operation::new(Arc::clone(resource), kind, request.context.clone());
    if kind.requires_id() {
        let id = request
            .param("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DispatchError::rejected(400, "id.required"))?;
        op = op.with_id(id);
    }
    if let Some(payload) = payload {
        op = op.with_payload(payload);
    }
    Ok(op)
}

/// Create and update validate the whole payload; patch only the fields it
/// carries. A missing payload is validated as an empty object.
async fn validate_payload(
    resource: &Resource,
    kind: OperationKind,
    op: &Operation,
) -> DispatchResult<()> {
    let Some(validator) = resource.validator().await? else {
        return Ok(());
    };
    let empty = json!({});
    let payload = op.payload().unwrap_or(&empty);
    let outcome = match kind {
        OperationKind::Patch => validator.validate_partial(payload),
        _ => validator.validate(payload),
    };
    if outcome.is_valid() {
        return Ok(());
    }
    debug!(
        resource = %resource.key(),
        schema = validator.name(),
        errors = ?outcome.errors(),
        "payload rejected"
    );
    Err(DispatchError::validation(
        "validation.failed",
        Some(json!(outcome.errors())),
    ))
}

/// Follows the truthiness rules of the render contract: `null`, `false`,
/// `0` and `""` count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(resource: &Resource, mut op: Operation) -> Response {
    let status = op
        .response()
        .status()
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    let response = match op.take_result() {
        None => status.into_response(),
        Some(value) if is_present(&value) => (status, Json(value)).into_response(),
        Some(_) => {
            let body = match op.id() {
                Some(id) => format!("{}.{id}.not.found", resource.key()),
                None => format!("{}.not.found", resource.key()),
            };
            (StatusCode::NOT_FOUND, body).into_response()
        }
    };
    with_headers(response, op.response())
}

fn with_headers(mut response: Response, meta: &ResponseMeta) -> Response {
    for (name, value) in meta.headers() {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    response
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

/// Maps an error to the response.
///
/// Classified errors answer with their status and `{message, details}`;
/// anything else is a plain-text 500. Everything except 400 is logged at
/// error level.
pub(super) fn handle_errors(resource: &Resource, kind: OperationKind, err: &DispatchError) -> Response {
    match err.status_code() {
        Some(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if code == 400 {
                debug!(resource = %resource.key(), operation = %kind, error = %err, "request rejected");
            } else {
                error!(
                    resource = %resource.key(),
                    operation = %kind,
                    status = code,
                    kind = err.kind(),
                    error = %err,
                    "operation failed"
                );
            }
            let body = ErrorBody {
                message: err.public_message(),
                details: err.details(),
            };
            (status, Json(body)).into_response()
        }
        None => {
            error!(
                resource = %resource.key(),
                operation = %kind,
                kind = err.kind(),
                error = %err.message(),
                "unclassified operation error"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, GENERAL_ERROR).into_response()
        }
    }
}
