//! EC2 implementation of the compute-lifecycle interface

use async_trait::async_trait;
use aws_sdk_ec2::Client;

use super::classify_sdk_error;
use super::imds::ImdsClient;
use crate::cloud::error::CloudError;
use crate::cloud::InstanceControl;
use crate::core::retry::{retry_throttling, ThrottlingRetryPolicy};

pub struct Ec2InstanceControl {
    client: Client,
    imds: ImdsClient,
    retry: ThrottlingRetryPolicy,
}

impl Ec2InstanceControl {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            imds: ImdsClient::new(),
            retry: ThrottlingRetryPolicy::default(),
        }
    }
}

#[async_trait]
impl InstanceControl for Ec2InstanceControl {
    async fn identity(&self) -> Result<String, CloudError> {
        self.imds.instance_id().await
    }

    async fn terminate(&self) -> Result<(), CloudError> {
        let instance_id = self.identity().await?;
        let client = &self.client;
        let id = instance_id.as_str();

        retry_throttling("ec2:terminate_instances", &self.retry, || async move {
            client
                .terminate_instances()
                .instance_ids(id)
                .send()
                .await
                .map_err(|error| classify_sdk_error("ec2", &error))
        })
        .await
        .map_err(CloudError::from)?;

        Ok(())
    }

    async fn force_shutdown(&self) {
        log::error!("Falling back to OS-level shutdown");
        match tokio::process::Command::new("shutdown")
            .args(["-h", "now"])
            .status()
            .await
        {
            Ok(status) if status.success() => {}
            Ok(status) => log::error!("OS shutdown exited with status {}", status),
            Err(error) => log::error!("OS shutdown could not be started: {}", error),
        }
    }
}
