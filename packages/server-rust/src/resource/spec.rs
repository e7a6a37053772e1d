//! Declarative resource configuration.
//!
//! A resource file names the resource, optionally overrides its URL segment,
//! and references its backend and schema by key. References may be a bare
//! string or a `{ "ref": ..., "config": ... }` object; both normalize to
//! [`ComponentRef`]. Unknown fields are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised while reading or checking a resource spec.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("resource key must not be empty")]
    EmptyKey,
    #[error("invalid resource segment `{segment}`: {reason}")]
    InvalidSegment {
        segment: String,
        reason: &'static str,
    },
    #[error("component reference must not be empty")]
    EmptyReference,
    #[error("failed to parse resource spec: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reference to a component (backend or schema set) resolved at init time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentRef {
    /// `"backend": "mongo"`
    Key(String),
    /// `"backend": { "ref": "mongo", "config": { ... } }`
    Detailed(DetailedRef),
}

/// Long form of a component reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedRef {
    #[serde(rename = "ref")]
    pub key: String,
    #[serde(default)]
    pub config: Option<Value>,
}

impl ComponentRef {
    /// Key the component is registered under.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::Detailed(detailed) => &detailed.key,
        }
    }

    /// Inline configuration; an empty object when none was given.
    #[must_use]
    pub fn config(&self) -> Value {
        match self {
            Self::Detailed(DetailedRef {
                config: Some(config),
                ..
            }) => config.clone(),
            _ => Value::Object(serde_json::Map::new()),
        }
    }
}

impl From<&str> for ComponentRef {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for ComponentRef {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

/// Configuration for one REST-exposed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    /// Unique identifier, also the default URL segment.
    pub key: String,
    /// URL segment override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Backend the six operations are delegated to.
    pub backend: ComponentRef,
    /// Schema set used for payload validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ComponentRef>,
}

impl ResourceSpec {
    #[must_use]
    pub fn new(key: impl Into<String>, backend: impl Into<ComponentRef>) -> Self {
        Self {
            key: key.into(),
            path: None,
            backend: backend.into(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<ComponentRef>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Parses a spec from JSON text and checks it.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Parse`] for malformed JSON or unknown fields, and
    /// the [`validate`](Self::validate) errors otherwise.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        let spec: Self = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reads a spec from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Io`] when the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_file(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// The URL segment the resource is mounted under.
    #[must_use]
    pub fn segment(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.key)
    }

    /// Checks the fields serde cannot.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is empty, a reference key is empty, or
    /// the URL segment contains characters that would break route matching.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.key.trim().is_empty() {
            return Err(SpecError::EmptyKey);
        }
        if self.backend.key().is_empty()
            || self.schema.as_ref().is_some_and(|s| s.key().is_empty())
        {
            return Err(SpecError::EmptyReference);
        }

        let segment = self.segment();
        let reason = if segment.is_empty() {
            Some("must not be empty")
        } else if segment.starts_with('/') || segment.ends_with('/') {
            Some("must not start or end with `/`")
        } else if segment.contains(':') {
            Some("must not contain `:`")
        } else if segment.contains(char::is_whitespace) {
            Some("must not contain whitespace")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(SpecError::InvalidSegment {
                segment: segment.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_short_and_long_references() {
        let spec = ResourceSpec::from_json(
            r#"{"key": "widgets", "backend": "memory", "schema": {"ref": "catalog"}}"#,
        )
        .unwrap();
        assert_eq!(spec.backend.key(), "memory");
        assert_eq!(spec.backend.config(), json!({}));
        assert_eq!(spec.schema.as_ref().unwrap().key(), "catalog");

        let spec = ResourceSpec::from_json(
            r#"{"key": "widgets", "backend": {"ref": "mongo", "config": {"collection": "w"}}}"#,
        )
        .unwrap();
        assert_eq!(spec.backend.key(), "mongo");
        assert_eq!(spec.backend.config(), json!({"collection": "w"}));
        assert!(spec.schema.is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = ResourceSpec::from_json(r#"{"key": "w", "backend": "m", "acl": []}"#);
        assert!(matches!(err, Err(SpecError::Parse(_))));

        let err = ResourceSpec::from_json(
            r#"{"key": "w", "backend": {"ref": "m", "collection": "x"}}"#,
        );
        assert!(matches!(err, Err(SpecError::Parse(_))));
    }

    #[test]
    fn segment_defaults_to_key() {
        let spec = ResourceSpec::new("widgets", "memory");
        assert_eq!(spec.segment(), "widgets");
        assert_eq!(spec.with_path("v1/gadgets").segment(), "v1/gadgets");
    }

    #[test]
    fn validate_rejects_bad_keys_and_segments() {
        assert!(matches!(
            ResourceSpec::new("  ", "memory").validate(),
            Err(SpecError::EmptyKey)
        ));
        assert!(matches!(
            ResourceSpec::new("widgets", "").validate(),
            Err(SpecError::EmptyReference)
        ));
        assert!(matches!(
            ResourceSpec::new("widgets", "memory").with_path("/widgets").validate(),
            Err(SpecError::InvalidSegment { .. })
        ));
        assert!(matches!(
            ResourceSpec::new("widgets", "memory").with_path("w/:id").validate(),
            Err(SpecError::InvalidSegment { .. })
        ));
    }
}
