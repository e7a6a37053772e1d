use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named schema definitions resolved for a resource.
pub type SchemaSet = BTreeMap<String, SchemaDefinition>;

/// JSON type a field is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Single field definition within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Name of the field.
    pub name: String,
    /// Whether the field must be present in every record.
    #[serde(default)]
    pub required: bool,
    /// Expected JSON type. `None` accepts anything.
    #[serde(default, rename = "type")]
    pub kind: Option<FieldKind>,
    /// Regular expression string values must match.
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Schema definition for a resource's records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDefinition {
    /// Human-readable name, used in log lines.
    #[serde(default)]
    pub title: Option<String>,
    /// Field definitions that comprise this schema.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Whether fields not listed in `fields` are accepted.
    #[serde(default = "default_additional_fields")]
    pub additional_fields: bool,
}

fn default_additional_fields() -> bool {
    true
}

/// Result of validating a value against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The value conforms to the schema.
    Valid,
    /// The value violates one or more schema constraints.
    Invalid {
        /// Human-readable descriptions of each validation failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Failure descriptions; empty when valid.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Valid => &[],
            Self::Invalid { errors } => errors,
        }
    }

    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid { errors }
        }
    }
}

/// Errors raised while compiling a schema definition.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("field `{field}` has an invalid pattern")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

impl SchemaDefinition {
    /// Compiles every field pattern, in field order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidPattern`] for the first pattern that is
    /// not a valid regular expression.
    pub fn compile_patterns(&self) -> Result<Vec<Option<Regex>>, SchemaError> {
        self.fields
            .iter()
            .map(|field| {
                field
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|source| SchemaError::InvalidPattern {
                        field: field.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}

impl FieldDef {
    fn check(&self, pattern: Option<&Regex>, value: &Value, errors: &mut Vec<String>) {
        if let Some(kind) = self.kind {
            if !kind.matches(value) {
                errors.push(format!("{} must be of type {}", self.name, kind.as_str()));
                return;
            }
        }
        if let (Some(re), Some(text)) = (pattern, value.as_str()) {
            if !re.is_match(text) {
                errors.push(format!("{} does not match {}", self.name, re.as_str()));
            }
        }
    }
}

#[derive(Debug)]
struct Compiled {
    name: String,
    definition: SchemaDefinition,
    patterns: Vec<Option<Regex>>,
}

/// A schema definition compiled for validation. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Validator {
    inner: Arc<Compiled>,
}

impl Validator {
    /// Compiles `definition` under `name`.
    ///
    /// # Errors
    ///
    /// Fails when a field pattern is not a valid regular expression.
    pub fn new(name: impl Into<String>, definition: SchemaDefinition) -> Result<Self, SchemaError> {
        let patterns = definition.compile_patterns()?;
        Ok(Self {
            inner: Arc::new(Compiled {
                name: name.into(),
                definition,
                patterns,
            }),
        })
    }

    /// Key the definition was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn definition(&self) -> &SchemaDefinition {
        &self.inner.definition
    }

    /// Validates a complete record: required fields must be present.
    #[must_use]
    pub fn validate(&self, value: &Value) -> ValidationResult {
        self.check(value, true)
    }

    /// Validates a partial record (patch payloads): only present fields are checked.
    #[must_use]
    pub fn validate_partial(&self, value: &Value) -> ValidationResult {
        self.check(value, false)
    }

    fn check(&self, value: &Value, enforce_required: bool) -> ValidationResult {
        let Some(object) = value.as_object() else {
            return ValidationResult::from_errors(vec!["value must be an object".to_string()]);
        };
        let definition = &self.inner.definition;

        let mut errors = Vec::new();
        for (field, pattern) in definition.fields.iter().zip(&self.inner.patterns) {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if enforce_required && field.required {
                        errors.push(format!("{} is required", field.name));
                    }
                }
                Some(found) => field.check(pattern.as_ref(), found, &mut errors),
            }
        }

        if !definition.additional_fields {
            for key in object.keys() {
                if !definition.fields.iter().any(|f| &f.name == key) {
                    errors.push(format!("{key} is not allowed"));
                }
            }
        }

        ValidationResult::from_errors(errors)
    }
}
