//! Instance metadata service (IMDSv2) client
//!
//! Token-authenticated metadata lookups over the link-local endpoint. Requests
//! retry with the generic backoff policy since any failure here is transient
//! network noise.

use crate::cloud::error::CloudError;
use crate::core::retry::{retry_backoff, BackoffPolicy};

const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";
const TOKEN_TTL_SECONDS: &str = "300";

pub struct ImdsClient {
    http: reqwest::Client,
    endpoint: String,
    retry: BackoffPolicy,
}

impl ImdsClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT.to_string())
    }

    /// Client against a non-default endpoint, used by tests
    pub fn with_endpoint(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            retry: BackoffPolicy::default(),
        }
    }

    async fn token(&self) -> Result<String, CloudError> {
        let url = format!("{}/latest/api/token", self.endpoint);
        let http = &self.http;

        retry_backoff("imds:token", &self.retry, || {
            let url = url.clone();
            async move {
                let response = http
                    .put(url)
                    .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS)
                    .send()
                    .await?;
                response.error_for_status()?.text().await
            }
        })
        .await
        .map_err(CloudError::Metadata)
    }

    /// Identity of the instance this process runs on
    pub async fn instance_id(&self) -> Result<String, CloudError> {
        let token = self.token().await?;
        let url = format!("{}/latest/meta-data/instance-id", self.endpoint);
        let http = &self.http;
        let token = token.as_str();

        retry_backoff("imds:instance-id", &self.retry, || {
            let url = url.clone();
            async move {
                let response = http
                    .get(url)
                    .header("X-aws-ec2-metadata-token", token)
                    .send()
                    .await?;
                response.error_for_status()?.text().await
            }
        })
        .await
        .map_err(CloudError::Metadata)
    }
}

impl Default for ImdsClient {
    fn default() -> Self {
        Self::new()
    }
}
