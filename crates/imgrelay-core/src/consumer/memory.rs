//! In-process notification queue.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ConsumerError;
use crate::types::{Notification, ObjectReference, Receipt};

use super::Consumer;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Notification>,
    in_flight: HashMap<Receipt, Notification>,
    acked: Vec<Receipt>,
    released: Vec<(Receipt, Duration)>,
    next_id: u64,
}

/// Queue held in memory.
///
/// Released notifications go straight back to the end of the queue with the
/// attempt count bumped; the requested delay is recorded but not waited out.
#[derive(Debug, Default)]
pub struct MemoryConsumer {
    state: Mutex<QueueState>,
}

impl MemoryConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a notification for `object_ref` and return its receipt.
    pub fn push(&self, object_ref: ObjectReference) -> Receipt {
        let mut state = self.state();
        state.next_id += 1;
        let receipt = Receipt::new(format!("msg-{}", state.next_id));
        state
            .pending
            .push_back(Notification::new(object_ref, receipt.clone()));
        receipt
    }

    /// Enqueue a prepared notification.
    pub fn push_notification(&self, notification: Notification) {
        self.state().pending.push_back(notification);
    }

    /// Every successful ack, in call order.
    pub fn acked(&self) -> Vec<Receipt> {
        self.state().acked.clone()
    }

    /// Number of times `receipt` was acknowledged.
    pub fn ack_count(&self, receipt: &Receipt) -> usize {
        self.state().acked.iter().filter(|r| *r == receipt).count()
    }

    /// Every release, in call order.
    pub fn released(&self) -> Vec<(Receipt, Duration)> {
        self.state().released.clone()
    }

    /// Notifications waiting to be received.
    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    /// Notifications received but neither acknowledged nor released.
    pub fn in_flight_len(&self) -> usize {
        self.state().in_flight.len()
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn receive(&self, max: usize) -> Result<Vec<Notification>, ConsumerError> {
        let mut state = self.state();
        let count = max.min(state.pending.len());
        let batch: Vec<Notification> = state.pending.drain(..count).collect();
        for notification in &batch {
            state
                .in_flight
                .insert(notification.receipt.clone(), notification.clone());
        }
        Ok(batch)
    }

    async fn ack(&self, receipt: &Receipt) -> Result<(), ConsumerError> {
        let mut state = self.state();
        if state.in_flight.remove(receipt).is_none() {
            return Err(ConsumerError::Transient {
                operation: "ack",
                message: format!("receipt {} is not in flight", receipt.as_str()),
            });
        }
        state.acked.push(receipt.clone());
        Ok(())
    }

    async fn release(&self, receipt: &Receipt, delay: Duration) -> Result<(), ConsumerError> {
        let mut state = self.state();
        let Some(notification) = state.in_flight.remove(receipt) else {
            return Err(ConsumerError::Transient {
                operation: "release",
                message: format!("receipt {} is not in flight", receipt.as_str()),
            });
        };
        let attempt = notification.attempt + 1;
        state.pending.push_back(notification.with_attempt(attempt));
        state.released.push((receipt.clone(), delay));
        Ok(())
    }
}
