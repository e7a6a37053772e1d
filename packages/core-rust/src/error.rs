//! Error taxonomy for the dispatch pipeline.
//!
//! Every failure raised by a hook, handler, backend or the resource lifecycle
//! is a [`DispatchError`]. The variant decides the HTTP status the error stage
//! responds with; errors that carry no status are reported as 500.

use serde_json::Value;

/// Fallback message for errors that must not leak their contents.
pub const GENERAL_ERROR: &str = "general.error";

/// Result alias used throughout the pipeline.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors produced while dispatching an operation.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Backend or schema resolution failed. Terminal for the resource.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The payload failed schema validation.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// A hook or handler rejected the operation with an explicit status.
    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// The storage call failed.
    #[error("{message}")]
    Backend {
        status: Option<u16>,
        message: String,
        details: Option<Value>,
    },

    /// Anything else. Reported as `general.error`.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DispatchError {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>, details: Option<Value>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches details to a variant that carries them. No-op otherwise.
    #[must_use]
    pub fn with_details(mut self, value: Value) -> Self {
        match &mut self {
            Self::Validation { details, .. }
            | Self::Rejected { details, .. }
            | Self::Backend { details, .. } => *details = Some(value),
            Self::Configuration { .. } | Self::Internal(_) => {}
        }
        self
    }

    /// Attaches a status to a backend error.
    #[must_use]
    pub fn with_status(mut self, code: u16) -> Self {
        if let Self::Backend { status, .. } = &mut self {
            *status = Some(code);
        }
        self
    }

    /// The HTTP status this error carries, if it was classified.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::Rejected { status, .. } => Some(*status),
            Self::Backend { status, .. } => *status,
            Self::Configuration { .. } | Self::Internal(_) => None,
        }
    }

    /// Message for the response body.
    ///
    /// Errors without a status collapse to [`GENERAL_ERROR`]; their text
    /// stays in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation { message, .. }
            | Self::Rejected { message, .. }
            | Self::Backend {
                status: Some(_),
                message,
                ..
            } if !message.is_empty() => message.clone(),
            _ => GENERAL_ERROR.to_string(),
        }
    }

    /// Structured details, when the variant carries them.
    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. }
            | Self::Rejected { details, .. }
            | Self::Backend { details, .. } => details.as_ref(),
            Self::Configuration { .. } | Self::Internal(_) => None,
        }
    }

    /// Raw message, including the text of internal errors. For logs only.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Short variant name for log fields and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::Rejected { .. } => "rejected",
            Self::Backend { .. } => "backend",
            Self::Internal(_) => "internal",
        }
    }
}
