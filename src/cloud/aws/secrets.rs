//! Secrets Manager implementation of the secret store

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;

use super::classify_sdk_error;
use crate::cloud::error::CloudError;
use crate::cloud::SecretStore;
use crate::core::retry::{retry_throttling, ThrottlingRetryPolicy};

pub struct SecretsManagerStore {
    client: Client,
    retry: ThrottlingRetryPolicy,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: ThrottlingRetryPolicy::default(),
        }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn fetch(&self, reference: &str) -> Result<String, CloudError> {
        let client = &self.client;

        let output = retry_throttling("secretsmanager:get_secret_value", &self.retry, || {
            async move {
                client
                    .get_secret_value()
                    .secret_id(reference)
                    .send()
                    .await
                    .map_err(|error| classify_sdk_error("secretsmanager", &error))
            }
        })
        .await
        .map_err(CloudError::from)?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| CloudError::Api {
                service: "secretsmanager",
                message: format!("secret '{}' has no string payload", reference),
            })
    }
}
