//! AWS-backed implementations of the collaborator interfaces

pub mod ec2;
pub mod imds;
pub mod s3;
pub mod secrets;
pub mod sns;

pub use ec2::Ec2InstanceControl;
pub use imds::ImdsClient;
pub use s3::S3ObjectStore;
pub use secrets::SecretsManagerStore;
pub use sns::SnsNotifier;

use crate::cloud::error::CloudError;
use aws_sdk_s3::error::ProvideErrorMetadata;

// Error codes the provider uses to signal throttling; everything else is a
// plain API failure.
const THROTTLING_CODES: &[&str] = &["TooManyRequestsException", "Throttling"];

/// Map an SDK error into the crate-local taxonomy using its error metadata.
pub(crate) fn classify_sdk_error<E>(service: &'static str, error: &E) -> CloudError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    let code = error.code().unwrap_or_default();
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", error));

    if THROTTLING_CODES.contains(&code) {
        CloudError::Throttling { service, message }
    } else if code.is_empty() {
        CloudError::Api { service, message }
    } else {
        CloudError::Api {
            service,
            message: format!("{} ({})", message, code),
        }
    }
}
