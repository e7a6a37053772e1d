//! In-memory document backend backed by [`DashMap`].
//!
//! Records are JSON objects keyed by the string form of their `id` field.
//! `create` answers with an insert acknowledgement so the create pipeline's
//! success path applies; missing records resolve to `null`.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use restkit_core::{DispatchError, DispatchResult};
use serde_json::{json, Map, Value};

use crate::service::Operation;
use crate::traits::Backend;

/// Concurrent in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: DashMap<String, Value>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds records, keyed by their `id` field. Records without one are skipped.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Value>) -> Self {
        let backend = Self::new();
        for record in records {
            if let Some(key) = record.get("id").and_then(id_key) {
                backend.records.insert(key, record);
            }
        }
        backend
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// String key for an id value. Only strings and numbers qualify.
fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn object_payload(op: &Operation) -> DispatchResult<Map<String, Value>> {
    match op.payload() {
        Some(Value::Object(members)) => Ok(members.clone()),
        Some(_) => Err(DispatchError::rejected(400, "payload.must.be.object")),
        None => Err(DispatchError::rejected(400, "payload.required")),
    }
}

fn target_id(op: &Operation) -> DispatchResult<&str> {
    op.id()
        .ok_or_else(|| DispatchError::rejected(400, "id.required"))
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, op: &Operation) -> DispatchResult<Value> {
        let id = target_id(op)?;
        Ok(self
            .records
            .get(id)
            .map_or(Value::Null, |entry| entry.value().clone()))
    }

    async fn list(&self, _op: &Operation) -> DispatchResult<Value> {
        let mut entries: Vec<(String, Value)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Value::Array(entries.into_iter().map(|(_, v)| v).collect()))
    }

    async fn create(&self, op: &Operation) -> DispatchResult<Value> {
        let mut record = object_payload(op)?;
        let key = match record.get("id") {
            Some(id) => id_key(id).ok_or_else(|| DispatchError::rejected(400, "id.invalid"))?,
            None => {
                let generated = uuid::Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(generated.clone()));
                generated
            }
        };

        let record = Value::Object(record);
        match self.records.entry(key) {
            Entry::Occupied(_) => Err(DispatchError::rejected(409, "id.conflict")),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(json!({
                    "result": {"ok": true},
                    "insertedCount": 1,
                    "ops": [record],
                }))
            }
        }
    }

    async fn update(&self, op: &Operation) -> DispatchResult<Value> {
        let id = target_id(op)?;
        let mut replacement = object_payload(op)?;
        let Some(mut entry) = self.records.get_mut(id) else {
            return Ok(Value::Null);
        };
        let stored_id = entry.get("id").cloned().unwrap_or_else(|| json!(id));
        replacement.insert("id".to_string(), stored_id);
        *entry = Value::Object(replacement);
        Ok(entry.clone())
    }

    async fn patch(&self, op: &Operation) -> DispatchResult<Value> {
        let id = target_id(op)?;
        let changes = object_payload(op)?;
        let Some(mut entry) = self.records.get_mut(id) else {
            return Ok(Value::Null);
        };
        if let Value::Object(members) = entry.value_mut() {
            for (field, value) in changes {
                if field != "id" {
                    members.insert(field, value);
                }
            }
        }
        Ok(entry.clone())
    }

    async fn remove(&self, op: &Operation) -> DispatchResult<Value> {
        let id = target_id(op)?;
        Ok(self.records.remove(id).map_or(Value::Null, |(_, record)| record))
    }
}
