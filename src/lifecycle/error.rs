//! Lifecycle error types

use crate::cloud::CloudError;
use crate::core::error_handling::{ClassifiedError, ErrorKind};
use crate::scanner::ScanError;

/// Errors surfaced by the initialize/scan/finalize phases
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Detector installation failed
    #[error("Detector installation failed: {message}")]
    Install { message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifiedError for LifecycleError {
    fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Cloud(inner) => inner.kind(),
            LifecycleError::Scan(inner) => inner.kind(),
            LifecycleError::Http(_) => ErrorKind::Transient,
            LifecycleError::Install { .. } | LifecycleError::Io(_) => ErrorKind::LifecycleFatal,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            LifecycleError::Cloud(inner) => inner.user_message(),
            LifecycleError::Scan(inner) => inner.user_message(),
            _ => None,
        }
    }
}
