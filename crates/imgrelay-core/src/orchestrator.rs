//! Pipeline orchestrator.
//!
//! One receive loop feeds a semaphore-bounded pool of tokio tasks, each running
//! one delivery coordinator invocation. The orchestrator is the only place
//! that decides whether a notification is acknowledged, released for
//! redelivery, or dead-lettered.
//!
//! ```text
//! Received → Processing → { Acknowledged | AwaitingRedelivery | DeadLettered }
//! ```

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::config::{Config, PipelineConfig};
use crate::consumer::Consumer;
use crate::dead_letter::{DeadLetterReason, DeadLetterRecord, DeadLetterSink};
use crate::error::{RelayError, Result};
use crate::pipeline::{retry, DeliveryCoordinator};
use crate::store::ObjectStore;
use crate::types::{
    Disposition, Notification, OutcomeReport, Overall, ProcessingOutcome, Receipt, VariantSpec,
};

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Maximum concurrent coordinator invocations
    pub concurrency: usize,
    /// Maximum notifications per receive call
    pub batch_size: usize,
    /// Delivery attempts before a retryable failure is dead-lettered
    pub max_attempts: u32,
    /// Base delay for redelivery backoff
    pub retry_delay_ms: u64,
    /// Sleep after an empty or failed receive
    pub idle_backoff_ms: u64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for OrchestratorOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            batch_size: config.batch_size.max(1),
            max_attempts: config.max_attempts.max(1),
            retry_delay_ms: config.retry_delay_ms,
            idle_backoff_ms: config.idle_backoff_ms,
        }
    }
}

/// How one delivery attempt of a notification ended.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub receipt: Receipt,
    pub attempt: u32,
    pub disposition: Disposition,
    #[serde(flatten)]
    pub report: OutcomeReport,
}

/// Disposition counts for one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub received: usize,
    pub acknowledged: usize,
    pub awaiting_redelivery: usize,
    pub dead_lettered: usize,
    /// Worker tasks that panicked; their notifications stay unacknowledged
    pub aborted: usize,
}

impl Tally {
    fn record(&mut self, delivery: &Delivery) {
        match delivery.disposition {
            Disposition::Acknowledged => self.acknowledged += 1,
            Disposition::AwaitingRedelivery => self.awaiting_redelivery += 1,
            Disposition::DeadLettered => self.dead_lettered += 1,
        }
    }
}

/// Decide what happens to a notification after one coordinator invocation.
///
/// Fatal outcomes never reach this point; the worker halts the orchestrator
/// instead.
pub fn decide(outcome: &ProcessingOutcome, attempt: u32, max_attempts: u32) -> Disposition {
    match outcome.overall {
        Overall::AllSucceeded => Disposition::Acknowledged,
        _ if !outcome.is_retryable() => Disposition::DeadLettered,
        _ if attempt >= max_attempts => Disposition::DeadLettered,
        _ => Disposition::AwaitingRedelivery,
    }
}

struct Shared {
    consumer: Arc<dyn Consumer>,
    coordinator: DeliveryCoordinator,
    specs: Vec<VariantSpec>,
    dead_letter: Arc<dyn DeadLetterSink>,
    options: OrchestratorOptions,
}

/// Drives notifications from a consumer through the delivery coordinator.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(
        consumer: Arc<dyn Consumer>,
        coordinator: DeliveryCoordinator,
        specs: Vec<VariantSpec>,
        dead_letter: Arc<dyn DeadLetterSink>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                consumer,
                coordinator,
                specs,
                dead_letter,
                options,
            }),
        }
    }

    /// Wire an orchestrator from configuration.
    pub fn from_config(
        config: &Config,
        consumer: Arc<dyn Consumer>,
        store: Arc<dyn ObjectStore>,
        dead_letter: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self::new(
            consumer,
            DeliveryCoordinator::from_config(store, config),
            config.variant_specs(),
            dead_letter,
            OrchestratorOptions::from(&config.pipeline),
        )
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.shared.options
    }

    /// Run the pull loop until `shutdown` turns true (or its sender is dropped).
    ///
    /// A pool slot is acquired before every receive, so the loop never holds
    /// more notifications than it can process. On shutdown the loop stops
    /// receiving (a receive already in progress completes and its batch is
    /// processed) and in-flight invocations finish before this returns. A fatal
    /// failure stops the loop the same way and is returned as the error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<Tally> {
        let options = &self.shared.options;
        let semaphore = Arc::new(Semaphore::new(options.concurrency));
        let idle = Duration::from_millis(options.idle_backoff_ms);
        let mut workers: JoinSet<Result<Delivery>> = JoinSet::new();
        let mut tally = Tally::default();
        let mut failure: Option<RelayError> = None;

        tracing::info!(
            consumer = self.shared.consumer.name(),
            concurrency = options.concurrency,
            batch_size = options.batch_size,
            "Starting receive loop"
        );

        loop {
            while let Some(joined) = workers.try_join_next() {
                settle(joined, &mut tally, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // A worker may have failed while we waited for its slot
            while let Some(joined) = workers.try_join_next() {
                settle(joined, &mut tally, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            let want = options
                .batch_size
                .min(semaphore.available_permits() + 1);
            // Not raced against shutdown: a dropped receive would strand the
            // messages it already claimed until their visibility timeout.
            let received = self.shared.consumer.receive(want).await;

            let batch = match received {
                Ok(batch) => batch,
                Err(e) if e.is_fatal() => {
                    tracing::error!("Receive failed: {e}");
                    failure = Some(e.into());
                    break;
                }
                Err(e) => {
                    tracing::warn!("Receive failed, backing off: {e}");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                drop(permit);
                tokio::select! {
                    biased;
                    _ = shutdown_signalled(&mut shutdown) => break,
                    _ = tokio::time::sleep(idle) => {}
                }
                continue;
            }

            tracing::debug!(count = batch.len(), "Dispatching batch");
            let mut first_permit = Some(permit);
            for notification in batch {
                tally.received += 1;
                let permit = match first_permit.take() {
                    Some(permit) => permit,
                    None => match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let shared = Arc::clone(&self.shared);
                workers.spawn(async move {
                    let delivery = handle(&shared, notification).await;
                    drop(permit);
                    delivery
                });
            }
        }

        if !workers.is_empty() {
            tracing::info!(in_flight = workers.len(), "Receive loop stopped, draining in-flight work");
        }
        while let Some(joined) = workers.join_next().await {
            settle(joined, &mut tally, &mut failure);
        }

        tracing::info!(
            received = tally.received,
            acknowledged = tally.acknowledged,
            awaiting_redelivery = tally.awaiting_redelivery,
            dead_lettered = tally.dead_lettered,
            "Receive loop finished"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(tally),
        }
    }

    /// Process one already-received batch under the concurrency bound.
    ///
    /// Every notification is settled before this returns; a fatal failure is
    /// returned after the others finish.
    pub async fn run_batch(&self, notifications: Vec<Notification>) -> Result<Vec<Delivery>> {
        let semaphore = Arc::new(Semaphore::new(self.shared.options.concurrency));
        let mut workers: JoinSet<Result<Delivery>> = JoinSet::new();

        for notification in notifications {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let shared = Arc::clone(&self.shared);
            workers.spawn(async move {
                let delivery = handle(&shared, notification).await;
                drop(permit);
                delivery
            });
        }

        let mut deliveries = Vec::new();
        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(delivery)) => deliveries.push(delivery),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => tracing::error!("Worker task panicked: {e}"),
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(deliveries),
        }
    }

    /// Receive and process until the consumer has nothing left.
    ///
    /// Meant for finite consumers (a push-delivered batch, an in-memory
    /// queue); against a live queue this returns on the first empty receive.
    pub async fn drain(&self) -> Result<Vec<Delivery>> {
        let mut deliveries = Vec::new();
        loop {
            let batch = self
                .shared
                .consumer
                .receive(self.shared.options.batch_size)
                .await?;
            if batch.is_empty() {
                return Ok(deliveries);
            }
            deliveries.extend(self.run_batch(batch).await?);
        }
    }
}

/// Resolves once shutdown is requested or the sender goes away.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn settle(
    joined: std::result::Result<Result<Delivery>, JoinError>,
    tally: &mut Tally,
    failure: &mut Option<RelayError>,
) {
    match joined {
        Ok(Ok(delivery)) => tally.record(&delivery),
        Ok(Err(e)) => {
            failure.get_or_insert(e);
        }
        Err(e) => {
            tracing::error!("Worker task panicked: {e}");
            tally.aborted += 1;
        }
    }
}

/// Process one notification and settle it with the consumer.
async fn handle(shared: &Shared, notification: Notification) -> Result<Delivery> {
    let Notification {
        object_ref,
        receipt,
        attempt,
    } = notification;
    let options = &shared.options;

    let outcome = shared.coordinator.process(&object_ref, &shared.specs).await;

    if let Some(fatal) = outcome.fatal_error() {
        tracing::error!(
            container = %object_ref.container_id,
            key = %object_ref.key,
            attempt,
            "Fatal failure, halting without acknowledgment: {fatal}"
        );
        return Err(fatal.clone().into());
    }

    let disposition = match decide(&outcome, attempt, options.max_attempts) {
        Disposition::Acknowledged => acknowledge(shared, &receipt, attempt).await?,
        Disposition::AwaitingRedelivery => {
            release(shared, &receipt, attempt).await;
            Disposition::AwaitingRedelivery
        }
        Disposition::DeadLettered => {
            let reason = if outcome.is_retryable() {
                DeadLetterReason::AttemptsExhausted
            } else {
                DeadLetterReason::Permanent
            };
            let record = DeadLetterRecord::new(&outcome, attempt, reason);
            match shared.dead_letter.record(&record).await {
                Ok(()) => match acknowledge(shared, &receipt, attempt).await? {
                    Disposition::Acknowledged => Disposition::DeadLettered,
                    other => other,
                },
                Err(e) => {
                    tracing::error!(
                        key = %object_ref.key,
                        sink = shared.dead_letter.name(),
                        "Dead-letter write failed, leaving for redelivery: {e}"
                    );
                    release(shared, &receipt, attempt).await;
                    Disposition::AwaitingRedelivery
                }
            }
        }
    };

    let report = OutcomeReport::from(&outcome);
    tracing::info!(
        container = %object_ref.container_id,
        key = %object_ref.key,
        attempt,
        overall = ?outcome.overall,
        disposition = %disposition,
        digest = outcome.source_digest.as_deref().unwrap_or("-"),
        "Notification settled"
    );

    Ok(Delivery {
        receipt,
        attempt,
        disposition,
        report,
    })
}

/// Acknowledge; a transient ack failure leaves the notification for redelivery.
async fn acknowledge(shared: &Shared, receipt: &Receipt, attempt: u32) -> Result<Disposition> {
    match shared.consumer.ack(receipt).await {
        Ok(()) => Ok(Disposition::Acknowledged),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            tracing::warn!(attempt, "Ack failed, notification will be redelivered: {e}");
            Ok(Disposition::AwaitingRedelivery)
        }
    }
}

async fn release(shared: &Shared, receipt: &Receipt, attempt: u32) {
    let delay = retry::redelivery_delay(attempt, shared.options.retry_delay_ms);
    if let Err(e) = shared.consumer.release(receipt, delay).await {
        tracing::warn!(attempt, "Release failed, falling back to visibility timeout: {e}");
    }
}
