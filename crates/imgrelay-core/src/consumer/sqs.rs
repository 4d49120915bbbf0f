//! SQS pull-loop consumer.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use std::time::Duration;

use crate::aws::{self, FailureKind};
use crate::config::QueueConfig;
use crate::error::ConsumerError;
use crate::types::{Notification, Receipt};

use super::event::{parse_event_body, EventBody};
use super::Consumer;

/// ReceiveMessage returns at most ten messages per call.
const MAX_RECEIVE: usize = 10;

/// SQS caps visibility timeouts at 12 hours.
const MAX_VISIBILITY_SECS: u64 = 43_200;

/// Long-polls an SQS queue fed by S3 event notifications.
#[derive(Clone)]
pub struct SqsConsumer {
    client: Client,
    queue_url: String,
    wait_time_secs: i32,
    visibility_timeout_secs: Option<i32>,
}

impl SqsConsumer {
    pub fn new(client: Client, queue: &QueueConfig) -> Self {
        Self {
            client,
            queue_url: queue.url.clone(),
            wait_time_secs: queue.wait_time_secs,
            visibility_timeout_secs: queue.visibility_timeout_secs,
        }
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, queue: &QueueConfig) -> Self {
        Self::new(Client::new(sdk_config), queue)
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), ConsumerError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| consumer_error("ack", &e))?;
        Ok(())
    }

    /// Turn one message into a notification, discarding bodies that are not
    /// object notifications.
    async fn accept(&self, message: Message) -> Option<Notification> {
        let receipt_handle = message.receipt_handle?;
        let message_id = message.message_id.unwrap_or_default();
        let attempt = message
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse::<u32>().ok())
            .unwrap_or(1);

        match parse_event_body(message.body.as_deref().unwrap_or_default()) {
            Ok(EventBody::Object(object_ref)) => Some(
                Notification::new(object_ref, Receipt::new(receipt_handle)).with_attempt(attempt),
            ),
            Ok(EventBody::Ignored(reason)) => {
                tracing::warn!(message_id = %message_id, reason = %reason, "Discarding non-object message");
                self.discard(&receipt_handle).await;
                None
            }
            Err(e) => {
                tracing::warn!(message_id = %message_id, "Discarding malformed message: {e}");
                self.discard(&receipt_handle).await;
                None
            }
        }
    }

    async fn discard(&self, receipt_handle: &str) {
        if let Err(e) = self.delete(receipt_handle).await {
            tracing::warn!("Failed to delete discarded message: {e}");
        }
    }
}

fn consumer_error<E>(operation: &'static str, err: &SdkError<E>) -> ConsumerError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = aws::describe(err);
    match aws::classify(err) {
        FailureKind::Fatal => ConsumerError::Fatal { operation, message },
        FailureKind::Transient | FailureKind::NotFound => {
            ConsumerError::Transient { operation, message }
        }
    }
}

/// Visibility timeout for a redelivery delay, in whole seconds.
fn visibility_secs(delay: Duration) -> i32 {
    // Bounded by MAX_VISIBILITY_SECS, so the cast cannot truncate
    delay.as_secs().min(MAX_VISIBILITY_SECS) as i32
}

#[async_trait]
impl Consumer for SqsConsumer {
    fn name(&self) -> &str {
        "sqs"
    }

    async fn receive(&self, max: usize) -> Result<Vec<Notification>, ConsumerError> {
        let max = max.clamp(1, MAX_RECEIVE) as i32;
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(self.wait_time_secs)
            .set_visibility_timeout(self.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| consumer_error("receive", &e))?;

        let messages = output.messages.unwrap_or_default();
        tracing::debug!(count = messages.len(), "Received messages");

        let mut notifications = Vec::with_capacity(messages.len());
        for message in messages {
            if let Some(notification) = self.accept(message).await {
                notifications.push(notification);
            }
        }
        Ok(notifications)
    }

    async fn ack(&self, receipt: &Receipt) -> Result<(), ConsumerError> {
        self.delete(receipt.as_str()).await
    }

    async fn release(&self, receipt: &Receipt, delay: Duration) -> Result<(), ConsumerError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt.as_str())
            .visibility_timeout(visibility_secs(delay))
            .send()
            .await
            .map_err(|e| consumer_error("release", &e))?;
        Ok(())
    }
}
