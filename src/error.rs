//! Error types for wbs
//!
//! Illegal structural operations (indent with no preceding sibling,
//! outdent below depth 2, drop onto self or a descendant) are not errors:
//! they surface as rejected no-op outcomes from the coordinator. The
//! variants here cover lookup failures, internal-consistency aborts, and
//! persistence failures.

use thiserror::Error;

use crate::hierarchy::ParseHierarchyError;
use crate::store::StoreError;
use crate::task::TaskId;

/// Main error type for wbs operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task has no hierarchy number: {0}")]
    Unpositioned(TaskId),

    #[error("outline consistency violated: {0}")]
    Consistency(String),

    #[error("invalid hierarchy number: {0}")]
    Hierarchy(#[from] ParseHierarchyError),

    #[error("failed to load task outline: {0}")]
    Load(#[source] StoreError),

    #[error("Failed to {action} task: {source}")]
    Submit {
        action: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Coarse category label used in structured error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TaskNotFound(_) | Error::Unpositioned(_) => "not_found",
            Error::Consistency(_) => "consistency",
            Error::Hierarchy(_) => "hierarchy",
            Error::Load(_) | Error::Submit { .. } => "store",
            Error::NothingToUndo => "undo",
            Error::Config(_) => "config",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
        }
    }

    /// Whether retrying the same operation after a refresh can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Load(source) | Error::Submit { source, .. } => {
                !matches!(source, StoreError::Fatal(_))
            }
            _ => false,
        }
    }
}

/// Result type alias for wbs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub kind: &'static str,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            kind: err.kind(),
            retryable: err.is_retryable(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_error_names_the_operation() {
        let err = Error::Submit {
            action: "indent",
            source: StoreError::Fatal("backend unavailable".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to indent task: store failure: backend unavailable"
        );
        assert_eq!(err.kind(), "store");
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_submit_is_retryable() {
        let err = Error::Submit {
            action: "outdent",
            source: StoreError::Transient("timeout".to_string()),
        };
        assert!(err.is_retryable());
    }
}
