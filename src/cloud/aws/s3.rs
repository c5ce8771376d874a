//! S3 object storage implementation
//!
//! Every request goes through the throttling-aware retry policy; object
//! listings are paginated so arbitrarily large input prefixes download fully.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::classify_sdk_error;
use crate::cloud::error::CloudError;
use crate::cloud::ObjectStore;
use crate::core::retry::{retry_throttling, ThrottlingRetryPolicy};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    retry: ThrottlingRetryPolicy,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self {
            client,
            bucket,
            retry: ThrottlingRetryPolicy::default(),
        }
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CloudError> {
        let client = &self.client;
        let bucket = self.bucket.as_str();

        let output = retry_throttling("s3:get_object", &self.retry, || async move {
            client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|error| {
                    if matches!(error.code(), Some("NoSuchKey") | Some("NotFound")) {
                        CloudError::NotFound {
                            key: key.to_string(),
                        }
                    } else {
                        classify_sdk_error("s3", &error)
                    }
                })
        })
        .await
        .map_err(CloudError::from)?;

        let body = output.body.collect().await.map_err(|error| CloudError::Api {
            service: "s3",
            message: format!("failed to read body of {}: {}", key, error),
        })?;
        Ok(body.into_bytes().to_vec())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CloudError> {
        let client = &self.client;
        let bucket = self.bucket.as_str();
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.clone();
            let response = retry_throttling("s3:list_objects", &self.retry, || {
                let token = token.clone();
                async move {
                    let mut request = client.list_objects_v2().bucket(bucket).prefix(prefix);
                    if let Some(token) = token {
                        request = request.continuation_token(token);
                    }
                    request
                        .send()
                        .await
                        .map_err(|error| classify_sdk_error("s3", &error))
                }
            })
            .await
            .map_err(CloudError::from)?;

            if let Some(contents) = response.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        // Skip directory markers
                        if !key.ends_with('/') {
                            keys.push(key);
                        }
                    }
                }
            }

            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn write_local(local_path: &Path, bytes: &[u8]) -> Result<(), CloudError> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        accept_missing: bool,
    ) -> Result<bool, CloudError> {
        match self.get_object(remote_path).await {
            Ok(bytes) => {
                Self::write_local(local_path, &bytes).await?;
                log::debug!("Downloaded {} to {}", remote_path, local_path.display());
                Ok(true)
            }
            Err(CloudError::NotFound { .. }) if accept_missing => {
                log::debug!("Optional object not present in storage: {}", remote_path);
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    async fn download_prefix(&self, prefix: &str, local_dir: &Path) -> Result<usize, CloudError> {
        let keys = self.list_keys(prefix).await?;
        let mut downloaded = 0usize;

        for key in keys {
            let relative = key
                .strip_prefix(prefix)
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(key.as_str());
            if relative.is_empty() {
                continue;
            }
            let destination = local_dir.join(relative);
            let bytes = self.get_object(&key).await?;
            Self::write_local(&destination, &bytes).await?;
            downloaded += 1;
        }

        log::debug!(
            "Downloaded {} objects from prefix {} to {}",
            downloaded,
            prefix,
            local_dir.display()
        );
        Ok(downloaded)
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<(), CloudError> {
        if !local_path.is_file() {
            return Err(CloudError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "file could not be uploaded as it does not exist: {}",
                    local_path.display()
                ),
            )));
        }

        let client = &self.client;
        let bucket = self.bucket.as_str();

        retry_throttling("s3:put_object", &self.retry, || async move {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|error| CloudError::Api {
                    service: "s3",
                    message: format!("failed to open {}: {}", local_path.display(), error),
                })?;
            client
                .put_object()
                .bucket(bucket)
                .key(remote_path)
                .body(body)
                .send()
                .await
                .map_err(|error| classify_sdk_error("s3", &error))
        })
        .await
        .map_err(CloudError::from)?;

        log::debug!("Uploaded {} to {}", local_path.display(), remote_path);
        Ok(())
    }
}
