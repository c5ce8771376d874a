//! SNS implementation of the operator notification channel

use async_trait::async_trait;
use aws_sdk_sns::Client;

use super::classify_sdk_error;
use crate::cloud::Notifier;
use crate::core::retry::{retry_throttling, ThrottlingRetryPolicy};

pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
    retry: ThrottlingRetryPolicy,
}

impl SnsNotifier {
    pub fn new(client: Client, topic_arn: String) -> Self {
        Self {
            client,
            topic_arn,
            retry: ThrottlingRetryPolicy::default(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn notify(&self, subject: &str, message: &str) {
        let client = &self.client;
        let topic_arn = self.topic_arn.as_str();

        let result = retry_throttling("sns:publish", &self.retry, || async move {
            client
                .publish()
                .topic_arn(topic_arn)
                .subject(subject)
                .message(message)
                .send()
                .await
                .map_err(|error| classify_sdk_error("sns", &error))
        })
        .await;

        // A broken notification channel must never mask the error being
        // reported, so failures are logged and swallowed.
        if let Err(error) = result {
            log::warn!("Operator notification could not be delivered: {}", error);
        }
    }
}
