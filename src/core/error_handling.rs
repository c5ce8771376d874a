//! Generic error classification utilities
//!
//! Provides a closed error-kind taxonomy shared by all modules so that the
//! coordinator and lifecycle layers can branch on what an error means instead
//! of downcasting concrete error types.

/// Closed taxonomy of failure classes
///
/// - `Configuration`: invalid or missing input; fatal to the whole job before
///   any repository work starts.
/// - `PerTarget`: scoped to one repository (clone failure, detector failure);
///   recorded as a failed outcome, never fatal to siblings.
/// - `Transient`: an external call failed after exhausting its retry budget.
/// - `LifecycleFatal`: outside the scan itself (artifact upload, instance
///   termination); triggers operator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    PerTarget,
    Transient,
    LifecycleFatal,
}

/// Trait for errors that carry a classification
///
/// `user_message` should return `Some` for configuration errors, where the
/// message itself tells an operator what to fix; system errors return `None`
/// and are reported with generic context plus debug detail.
pub trait ClassifiedError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    fn user_message(&self) -> Option<&str> {
        None
    }
}

/// Log an error with detail appropriate to its classification
///
/// Configuration errors surface their own message at error level; everything
/// else shows the operation context, with the error chain at debug level.
pub fn log_error_with_context<E: ClassifiedError>(error: &E, operation_context: &str) {
    match error.user_message() {
        Some(message) => log::error!("FATAL: {}", message),
        None => log::error!("FATAL: {}: {}", operation_context, error),
    }
    log::debug!("DETAIL: {:?}", error);
}
