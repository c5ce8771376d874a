//! Scanner error types

use crate::cloud::CloudError;
use crate::core::error_handling::{ClassifiedError, ErrorKind};

/// Scanner error types
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Invalid or missing input configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Scan credentials were absent when scanning began
    #[error("Credentials not found in environment variables: {missing}")]
    CredentialsMissing { missing: String },

    /// A repository could not be cloned
    #[error("Clone of {repository} failed: {message}")]
    Clone {
        repository: String,
        message: String,
    },

    /// The detector process failed or could not be started
    #[error("Detector execution failed: {message}")]
    Detector { message: String },

    /// A host command (git config, chmod) failed
    #[error("Command failed: {message}")]
    Command { message: String },

    /// The job-level result document could not be produced
    #[error("Result document error: {message}")]
    Report { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl ClassifiedError for ScanError {
    fn kind(&self) -> ErrorKind {
        match self {
            ScanError::Configuration { .. } | ScanError::CredentialsMissing { .. } => {
                ErrorKind::Configuration
            }
            ScanError::Clone { .. } | ScanError::Detector { .. } => ErrorKind::PerTarget,
            ScanError::Command { .. } | ScanError::Report { .. } | ScanError::Io(_) => {
                ErrorKind::LifecycleFatal
            }
            ScanError::Cloud(inner) => inner.kind(),
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ScanError::Configuration { message } => Some(message),
            ScanError::CredentialsMissing { missing } => Some(missing),
            _ => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
