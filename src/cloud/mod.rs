//! External collaborator interfaces
//!
//! The orchestration core only ever sees these traits: object storage for
//! inputs and artifacts, a secret store for scan credentials, an operator
//! notification channel, and the compute-lifecycle API of the instance the
//! scan runs on. Concrete AWS-backed implementations live in [`aws`].

pub mod aws;
pub mod error;

pub use error::CloudError;

use async_trait::async_trait;
use std::path::Path;

/// Object storage holding scan inputs and receiving result artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download a single object to `local_path`.
    ///
    /// Returns `Ok(false)` when the object does not exist and `accept_missing`
    /// is set; a missing required object is an error.
    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        accept_missing: bool,
    ) -> Result<bool, CloudError>;

    /// Download every object under `prefix` into `local_dir`, recreating the
    /// relative key structure. Returns the number of objects downloaded.
    async fn download_prefix(&self, prefix: &str, local_dir: &Path) -> Result<usize, CloudError>;

    /// Upload a local file to `remote_path`.
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<(), CloudError>;
}

/// Managed secret store resolving a reference to its payload
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<String, CloudError>;
}

/// Fire-and-forget operator notification channel
///
/// Delivery is best effort: implementations log failures and swallow them, a
/// broken notification channel must never mask the error being reported.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str);
}

/// Compute-lifecycle API of the instance this process runs on
#[async_trait]
pub trait InstanceControl: Send + Sync {
    /// Identity of the running instance, for operator-visible messages.
    async fn identity(&self) -> Result<String, CloudError>;

    /// Ask the provider to terminate this instance.
    async fn terminate(&self) -> Result<(), CloudError>;

    /// Unconditional OS-level shutdown, used when [`terminate`] itself fails.
    async fn force_shutdown(&self);
}

/// Notifier used when no operator channel is configured
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, subject: &str, message: &str) {
        log::warn!(
            "No notification channel configured, dropping message: {} {}",
            subject,
            message
        );
    }
}
