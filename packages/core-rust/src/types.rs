use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority assigned to hooks that do not declare one.
pub const DEFAULT_HOOK_PRIORITY: u32 = 5;

/// The six CRUD operations a resource exposes.
///
/// Every per-kind lookup (default handlers, handler overrides, hook chains)
/// goes through a fixed table indexed by [`OperationKind::index`], so there is
/// no name-based dispatch anywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Fetch a single record by id.
    Read,
    /// Fetch the collection.
    List,
    /// Insert a new record from the payload.
    Create,
    /// Replace a record by id.
    Update,
    /// Partially modify a record by id.
    Patch,
    /// Delete a record by id.
    Remove,
}

impl OperationKind {
    /// All kinds, in endpoint declaration order.
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Read,
        OperationKind::List,
        OperationKind::Create,
        OperationKind::Update,
        OperationKind::Patch,
        OperationKind::Remove,
    ];

    /// Number of kinds; the size of every per-kind table.
    pub const COUNT: usize = 6;

    /// Lower-case name used in logs, metrics labels and resource files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Remove => "remove",
        }
    }

    /// Parses a lower-case operation name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Position of this kind in per-kind tables.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// HTTP method the endpoint for this kind is bound to.
    #[must_use]
    pub fn http_method(self) -> &'static str {
        match self {
            Self::Read | Self::List => "GET",
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::Patch => "PATCH",
            Self::Remove => "DELETE",
        }
    }

    /// Whether the route carries an `:id` segment.
    #[must_use]
    pub fn requires_id(self) -> bool {
        !matches!(self, Self::List | Self::Create)
    }

    /// Whether the request body is parsed into the operation payload.
    #[must_use]
    pub fn carries_payload(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Patch)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Runs before the handler.
    Pre,
    /// Runs after the handler, with the result in place.
    Post,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// Typed view over the acknowledgement a backend returns from `create`.
///
/// Expected shape: `{"result": {"ok": bool}, "insertedCount": n, "ops": [record, ...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertAck {
    /// `result.ok` as reported by the backend.
    pub ok: bool,
    /// Number of inserted records.
    pub inserted_count: u64,
    /// The inserted records, in insertion order.
    pub ops: Vec<Value>,
}

impl InsertAck {
    /// Reads an acknowledgement out of a raw backend result.
    ///
    /// Returns `None` when the value does not carry the `result.ok` flag.
    #[must_use]
    pub fn parse(raw: &Value) -> Option<Self> {
        let ok = raw.get("result")?.get("ok")?.as_bool()?;
        let inserted_count = raw
            .get("insertedCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let ops = raw
            .get("ops")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Some(Self {
            ok,
            inserted_count,
            ops,
        })
    }

    /// A create succeeded when the backend reports ok and exactly one insert.
    /// Multi-document inserts are not a success path.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.ok && self.inserted_count == 1
    }

    /// The record that was inserted, if any.
    #[must_use]
    pub fn inserted(&self) -> Option<&Value> {
        self.ops.first()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::parse("delete"), None);
    }

    #[test]
    fn kind_indices_are_dense() {
        let indices: Vec<usize> = OperationKind::ALL.iter().map(|k| k.index()).collect();
        assert_eq!(indices, (0..OperationKind::COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn methods_and_id_requirements_match_endpoint_table() {
        let table: Vec<(&str, bool)> = OperationKind::ALL
            .iter()
            .map(|k| (k.http_method(), k.requires_id()))
            .collect();
        assert_eq!(
            table,
            vec![
                ("GET", true),
                ("GET", false),
                ("POST", false),
                ("PUT", true),
                ("PATCH", true),
                ("DELETE", true),
            ]
        );
    }

    #[test]
    fn insert_ack_success_requires_single_insert() {
        let ack = InsertAck::parse(&json!({
            "result": {"ok": true},
            "insertedCount": 1,
            "ops": [{"id": 1, "name": "x"}]
        }))
        .unwrap();
        assert!(ack.is_success());
        assert_eq!(ack.inserted(), Some(&json!({"id": 1, "name": "x"})));

        let batch = InsertAck::parse(&json!({
            "result": {"ok": true},
            "insertedCount": 2,
            "ops": [{"id": 1}, {"id": 2}]
        }))
        .unwrap();
        assert!(!batch.is_success());
    }

    #[test]
    fn insert_ack_rejects_other_shapes() {
        assert!(InsertAck::parse(&json!({"id": 1})).is_none());
        assert!(InsertAck::parse(&json!(null)).is_none());

        let failed = InsertAck::parse(&json!({"result": {"ok": false}})).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.inserted_count, 0);
    }

    #[test]
    fn kinds_deserialize_from_lowercase() {
        let kind: OperationKind = serde_json::from_str("\"patch\"").unwrap();
        assert_eq!(kind, OperationKind::Patch);
    }
}
