//! `restkit` core: operation kinds, request context, error taxonomy and schema validation.
//!
//! Nothing in this crate touches the network; the server crate builds the
//! dispatch pipeline on top of these types.

pub mod context;
pub mod error;
pub mod schema;
pub mod types;

pub use context::{Principal, RequestContext, ResponseMeta};
pub use error::{DispatchError, DispatchResult, GENERAL_ERROR};
pub use schema::{
    FieldDef, FieldKind, SchemaDefinition, SchemaError, SchemaSet, ValidationResult, Validator,
};
pub use types::{InsertAck, OperationKind, Phase, DEFAULT_HOOK_PRIORITY};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
