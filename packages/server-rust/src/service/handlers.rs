//! Default CRUD handlers and the per-kind override table.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use restkit_core::{DispatchResult, InsertAck, OperationKind};
use serde_json::Value;
use tracing::{debug, warn};

use super::operation::Operation;

/// Boxed handler override. Receives the operation and the default handler it
/// replaces, so it can decorate or delegate to the default behavior.
pub type HandlerFn =
    Arc<dyn Fn(Operation, DefaultHandler) -> BoxFuture<'static, DispatchResult<Operation>> + Send + Sync>;

/// The built-in handler for one operation kind: a call to the matching
/// backend method whose outcome becomes the operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultHandler {
    kind: OperationKind,
}

impl DefaultHandler {
    #[must_use]
    pub fn for_kind(kind: OperationKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn kind(self) -> OperationKind {
        self.kind
    }

    /// Runs the default behavior.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the resource failed to initialize,
    /// or the backend's error.
    pub async fn call(self, op: Operation) -> DispatchResult<Operation> {
        debug!(
            resource = %op.resource().key(),
            operation = %self.kind,
            "performing a {} operation",
            self.kind
        );
        let backend = op.resource().backend().await?;
        let result = match self.kind {
            OperationKind::Read => backend.read(&op).await?,
            OperationKind::List => backend.list(&op).await?,
            OperationKind::Create => {
                let raw = backend.create(&op).await?;
                return finish_create(op, raw).await;
            }
            OperationKind::Update => backend.update(&op).await?,
            OperationKind::Patch => backend.patch(&op).await?,
            OperationKind::Remove => backend.remove(&op).await?,
        };
        Ok(op.with_result(result))
    }
}

/// Create treats the backend result as an insert acknowledgement.
///
/// On a single successful insert the status becomes 201 and the inserted
/// record is the result. When the resource declares a schema, the record is
/// validated for diagnostics only: failures are logged, never returned.
/// Any other shape is echoed back as `result.result` (or the raw value when
/// there is no `result` member).
async fn finish_create(mut op: Operation, raw: Value) -> DispatchResult<Operation> {
    debug!(resource = %op.resource().key(), result = %raw, "create result");

    let ack = InsertAck::parse(&raw).filter(InsertAck::is_success);
    let Some(ack) = ack else {
        let echo = match raw {
            Value::Object(mut members) => members
                .remove("result")
                .unwrap_or(Value::Object(members)),
            other => other,
        };
        return Ok(op.with_result(echo));
    };

    op.set_status(201);
    let record = ack.inserted().cloned().unwrap_or(Value::Null);

    if op.resource().has_schema() {
        match op.resource().validator().await {
            Ok(Some(validator)) => {
                let outcome = validator.validate(&record);
                if outcome.is_valid() {
                    debug!(resource = %op.resource().key(), "inserted record matches schema");
                } else {
                    warn!(
                        resource = %op.resource().key(),
                        schema = validator.name(),
                        errors = ?outcome.errors(),
                        "inserted record does not match schema"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                resource = %op.resource().key(),
                error = %e,
                "schema unavailable for post-create validation"
            ),
        }
    }

    Ok(op.with_result(record))
}

/// Optional handler overrides, one slot per operation kind.
#[derive(Clone, Default)]
pub struct HandlerTable {
    slots: [Option<HandlerFn>; OperationKind::COUNT],
}

impl HandlerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an override for `kind`, replacing any previous one.
    pub fn set<F, Fut>(&mut self, kind: OperationKind, func: F) -> &mut Self
    where
        F: Fn(Operation, DefaultHandler) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Operation>> + Send + 'static,
    {
        self.slots[kind.index()] = Some(Arc::new(move |op, default| Box::pin(func(op, default))));
        self
    }

    #[must_use]
    pub fn get(&self, kind: OperationKind) -> Option<&HandlerFn> {
        self.slots[kind.index()].as_ref()
    }

    /// Kinds that have an override installed.
    pub fn overridden(&self) -> impl Iterator<Item = OperationKind> + '_ {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| self.slots[kind.index()].is_some())
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.overridden()).finish()
    }
}

#[cfg(test)]
mod tests {
    use restkit_core::RequestContext;
    use serde_json::json;

    use super::*;
    use crate::resource::testing::{resource_with_backend, ScriptedBackend};
    use crate::resource::ResourceSpec;

    #[tokio::test]
    async fn each_kind_calls_its_backend_method_once() {
        for kind in OperationKind::ALL {
            let backend = ScriptedBackend::new().respond(kind, json!({"kind": kind.as_str()}));
            let resource = resource_with_backend(
                ResourceSpec::new("widgets", "scripted"),
                backend.clone(),
                |b| b,
            );
            let op = Operation::new(resource, kind, RequestContext::default());

            let op = DefaultHandler::for_kind(kind).call(op).await.unwrap();
            let kinds: Vec<OperationKind> = backend.calls().into_iter().map(|(k, _)| k).collect();
            assert_eq!(kinds, vec![kind]);
            if kind != OperationKind::Create {
                assert_eq!(op.result(), Some(&json!({"kind": kind.as_str()})));
            }
        }
    }

    #[tokio::test]
    async fn successful_inserts_answer_201_with_the_record() {
        let backend = ScriptedBackend::new().respond(
            OperationKind::Create,
            json!({"result": {"ok": true}, "insertedCount": 1, "ops": [{"id": "w1"}]}),
        );
        let resource = resource_with_backend(ResourceSpec::new("widgets", "scripted"), backend, |b| b);
        let op = Operation::new(resource, OperationKind::Create, RequestContext::default());

        let op = DefaultHandler::for_kind(OperationKind::Create).call(op).await.unwrap();
        assert_eq!(op.response().status(), Some(201));
        assert_eq!(op.result(), Some(&json!({"id": "w1"})));
    }
}
