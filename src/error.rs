//! Errors surfaced synchronously by the engines.
//!
//! Per-item failures inside a batch never become an `EngineError`; they are
//! collected in the operation's report and appended to the error log. An
//! `EngineError` means the whole call was rejected or could not start.

use crate::store::StoreError;
use std::path::PathBuf;

/// Errors that stop an engine operation before (or instead of) doing work.
#[derive(Debug)]
pub enum EngineError {
    /// A required argument was missing or malformed. Nothing was touched.
    InvalidInput {
        /// The name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// The persistence store could not be read or written.
    Store(StoreError),
    /// A filesystem operation needed by the whole call failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::Store(e) => write!(f, "{}", e),
            Self::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            Self::InvalidInput { .. } => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
