//! Push-trigger consumer over one already-delivered SQS batch.
//!
//! A function runtime hands the handler a batch of messages and redelivers
//! whichever ones the handler reports as failed. Receipts here are message
//! IDs; anything not acknowledged by the end of the invocation is reported in
//! the partial batch response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::ConsumerError;
use crate::types::{Notification, Receipt};

use super::event::{parse_event_body, EventBody};
use super::Consumer;

#[derive(Debug, Deserialize)]
struct SqsEvent {
    #[serde(rename = "Records", default)]
    records: Vec<SqsRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqsRecord {
    message_id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

/// One message the runtime should redeliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// Partial batch response returned to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Default)]
struct BatchState {
    pending: VecDeque<Notification>,
    /// Message IDs not yet acknowledged, in delivery order
    outstanding: Vec<String>,
}

/// Consumer over a single push-delivered batch.
#[derive(Debug, Default)]
pub struct BatchConsumer {
    state: Mutex<BatchState>,
}

impl BatchConsumer {
    /// Parse an SQS trigger event.
    ///
    /// Messages whose bodies are not object notifications are dropped here and
    /// never reported as failures, so the runtime deletes them.
    pub fn from_json(event: &str) -> Result<Self, ConsumerError> {
        let event: SqsEvent = serde_json::from_str(event)?;
        let mut state = BatchState::default();

        for record in event.records {
            let attempt = record
                .attributes
                .get("ApproximateReceiveCount")
                .and_then(|count| count.parse::<u32>().ok())
                .unwrap_or(1);

            match parse_event_body(&record.body) {
                Ok(EventBody::Object(object_ref)) => {
                    state.outstanding.push(record.message_id.clone());
                    state.pending.push_back(
                        Notification::new(object_ref, Receipt::new(record.message_id))
                            .with_attempt(attempt),
                    );
                }
                Ok(EventBody::Ignored(reason)) => {
                    tracing::warn!(message_id = %record.message_id, reason = %reason, "Discarding non-object message");
                }
                Err(e) => {
                    tracing::warn!(message_id = %record.message_id, "Discarding malformed message: {e}");
                }
            }
        }

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of notifications in the batch not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.state().outstanding.len()
    }

    /// Messages the runtime must redeliver.
    pub fn response(&self) -> BatchResponse {
        BatchResponse {
            batch_item_failures: self
                .state()
                .outstanding
                .iter()
                .map(|id| BatchItemFailure {
                    item_identifier: id.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Consumer for BatchConsumer {
    fn name(&self) -> &str {
        "batch"
    }

    async fn receive(&self, max: usize) -> Result<Vec<Notification>, ConsumerError> {
        let mut state = self.state();
        let count = max.min(state.pending.len());
        Ok(state.pending.drain(..count).collect())
    }

    async fn ack(&self, receipt: &Receipt) -> Result<(), ConsumerError> {
        let mut state = self.state();
        let Some(index) = state
            .outstanding
            .iter()
            .position(|id| id == receipt.as_str())
        else {
            return Err(ConsumerError::Transient {
                operation: "ack",
                message: format!("message {} is not outstanding", receipt.as_str()),
            });
        };
        state.outstanding.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectReference;

    fn s3_body(key: &str) -> String {
        serde_json::json!({
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": { "bucket": { "name": "uploads" }, "object": { "key": key } }
            }]
        })
        .to_string()
    }

    fn sqs_event() -> String {
        serde_json::json!({
            "Records": [
                {
                    "messageId": "m-1",
                    "receiptHandle": "rh-1",
                    "body": s3_body("a.png"),
                    "attributes": { "ApproximateReceiveCount": "1" },
                    "eventSource": "aws:sqs"
                },
                {
                    "messageId": "m-2",
                    "receiptHandle": "rh-2",
                    "body": s3_body("b.png"),
                    "attributes": { "ApproximateReceiveCount": "3" },
                    "eventSource": "aws:sqs"
                },
                {
                    "messageId": "m-3",
                    "receiptHandle": "rh-3",
                    "body": "{\"Event\":\"s3:TestEvent\"}",
                    "attributes": {},
                    "eventSource": "aws:sqs"
                }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_parses_batch_and_skips_test_events() {
        let consumer = BatchConsumer::from_json(&sqs_event()).unwrap();
        assert_eq!(consumer.outstanding(), 2);

        let batch = consumer.receive(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].object_ref, ObjectReference::new("uploads", "a.png"));
        assert_eq!(batch[0].receipt.as_str(), "m-1");
        assert_eq!(batch[1].attempt, 3);

        // Exhausted after one pass
        assert!(consumer.receive(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_response_lists_unacknowledged() {
        let consumer = BatchConsumer::from_json(&sqs_event()).unwrap();
        consumer.receive(10).await.unwrap();
        consumer.ack(&Receipt::new("m-1")).await.unwrap();

        let response = consumer.response();
        assert_eq!(
            response.batch_item_failures,
            vec![BatchItemFailure {
                item_identifier: "m-2".to_string()
            }]
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["batchItemFailures"][0]["itemIdentifier"], "m-2");
    }

    #[tokio::test]
    async fn test_unreceived_notifications_are_reported() {
        let consumer = BatchConsumer::from_json(&sqs_event()).unwrap();
        consumer.receive(1).await.unwrap();
        assert_eq!(consumer.response().batch_item_failures.len(), 2);
    }

    #[tokio::test]
    async fn test_double_ack_rejected() {
        let consumer = BatchConsumer::from_json(&sqs_event()).unwrap();
        consumer.ack(&Receipt::new("m-1")).await.unwrap();
        assert!(consumer.ack(&Receipt::new("m-1")).await.is_err());
    }

    #[test]
    fn test_malformed_event_is_error() {
        assert!(BatchConsumer::from_json("not json").is_err());
    }
}
