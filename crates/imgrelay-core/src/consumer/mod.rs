//! Notification consumers.
//!
//! A consumer delivers [`Notification`]s and exposes acknowledgment. The same
//! orchestrator drives every hosting shape:
//!
//! - [`SqsConsumer`] long-polls a queue (pull loop)
//! - [`BatchConsumer`] wraps one batch already handed to a function runtime
//!   (push trigger)
//! - [`MemoryConsumer`] is an in-process queue for one-shot runs and tests

mod batch;
mod event;
mod memory;
mod sqs;

pub use batch::{BatchConsumer, BatchItemFailure, BatchResponse};
pub use event::{parse_event_body, EventBody};
pub use memory::MemoryConsumer;
pub use sqs::SqsConsumer;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ConsumerError;
use crate::types::{Notification, Receipt};

/// Source of notifications.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Consumer name for logging (e.g., "sqs", "batch").
    fn name(&self) -> &str;

    /// Receive up to `max` notifications.
    ///
    /// An empty batch means nothing is available right now; a finite consumer
    /// returns empty batches once it is exhausted.
    async fn receive(&self, max: usize) -> Result<Vec<Notification>, ConsumerError>;

    /// Permanently remove a notification. Called at most once per receipt.
    async fn ack(&self, receipt: &Receipt) -> Result<(), ConsumerError>;

    /// Ask for redelivery after `delay`.
    ///
    /// Not acknowledging is already enough to get a notification redelivered;
    /// consumers that cannot shorten or extend the wait ignore this.
    async fn release(&self, receipt: &Receipt, delay: Duration) -> Result<(), ConsumerError> {
        let _ = (receipt, delay);
        Ok(())
    }
}
