//! Cloud collaborator error types

use crate::core::error_handling::{ClassifiedError, ErrorKind};
use crate::core::retry::{RetryError, ThrottlingError};

/// Errors surfaced by external collaborator calls
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// The provider asked the caller to back off; retried by policy
    #[error("{service} call was throttled: {message}")]
    Throttling {
        service: &'static str,
        message: String,
    },

    /// Any other provider-side failure
    #[error("{service} call failed: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    /// The requested object does not exist in storage
    #[error("object does not exist in storage: {key}")]
    NotFound { key: String },

    /// Every retry attempt was throttled
    #[error("maximum attempts reached calling operation: {operation}")]
    RetriesExhausted { operation: String },

    /// Instance metadata service request failed
    #[error("instance metadata request failed: {0}")]
    Metadata(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThrottlingError for CloudError {
    fn is_throttling(&self) -> bool {
        matches!(self, CloudError::Throttling { .. })
    }
}

impl From<RetryError<CloudError>> for CloudError {
    fn from(error: RetryError<CloudError>) -> Self {
        match error {
            RetryError::Operation(inner) => inner,
            RetryError::Exhausted { operation } => CloudError::RetriesExhausted { operation },
        }
    }
}

impl ClassifiedError for CloudError {
    fn kind(&self) -> ErrorKind {
        match self {
            CloudError::Throttling { .. }
            | CloudError::RetriesExhausted { .. }
            | CloudError::Metadata(_) => ErrorKind::Transient,
            CloudError::NotFound { .. } => ErrorKind::Configuration,
            CloudError::Api { .. } | CloudError::Io(_) => ErrorKind::LifecycleFatal,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_classification() {
        let throttled = CloudError::Throttling {
            service: "s3",
            message: "slow down".to_string(),
        };
        let failed = CloudError::Api {
            service: "s3",
            message: "access denied".to_string(),
        };

        assert!(throttled.is_throttling());
        assert!(!failed.is_throttling());
        assert_eq!(throttled.kind(), ErrorKind::Transient);
        assert_eq!(failed.kind(), ErrorKind::LifecycleFatal);
    }

    #[test]
    fn retry_exhaustion_flattens_into_cloud_error() {
        let exhausted: CloudError = RetryError::<CloudError>::Exhausted {
            operation: "s3:get_object".to_string(),
        }
        .into();

        match exhausted {
            CloudError::RetriesExhausted { operation } => {
                assert_eq!(operation, "s3:get_object")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
