//! Variant delivery for one source object.
//!
//! Fetches the source, decodes it once, then renders and uploads each variant
//! in isolation so one failing width never hides the others. The coordinator
//! only classifies; acknowledgment is decided by the orchestrator.

use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::error::PipelineError;
use crate::store::{ObjectStore, PutOptions};
use crate::types::{ObjectReference, ProcessingOutcome, VariantOutcome, VariantSpec, Visibility};

use super::decode::DecodedImage;
use super::hash::content_digest;
use super::retry;
use super::transcoder::Transcoder;

/// Fetch → decode once → (resize, encode, put) per variant.
pub struct DeliveryCoordinator {
    store: Arc<dyn ObjectStore>,
    transcoder: Transcoder,
    destination: String,
    visibility: Visibility,
    store_retry_attempts: u32,
    retry_delay_ms: u64,
}

impl DeliveryCoordinator {
    /// Create a coordinator that does not retry store calls in-process.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transcoder: Transcoder,
        destination: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            store,
            transcoder,
            destination: destination.into(),
            visibility,
            store_retry_attempts: 0,
            retry_delay_ms: 0,
        }
    }

    /// Retry transient store failures `attempts` times with exponential backoff.
    pub fn with_store_retries(mut self, attempts: u32, retry_delay_ms: u64) -> Self {
        self.store_retry_attempts = attempts;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        let transcoder = Transcoder::new(config.limits.clone(), &config.transcode);
        Self::new(
            store,
            transcoder,
            config.destination.container.clone(),
            config.destination.visibility,
        )
        .with_store_retries(
            config.pipeline.store_retry_attempts,
            config.pipeline.retry_delay_ms,
        )
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Produce every variant of `object_ref` and aggregate the results.
    ///
    /// Never mutates the source. Re-running on the same object overwrites the
    /// same destination keys with equivalent content.
    pub async fn process(
        &self,
        object_ref: &ObjectReference,
        specs: &[VariantSpec],
    ) -> ProcessingOutcome {
        let target = object_ref.to_string();
        let bytes = match self
            .with_store_retry("fetch", &target, || self.store.fetch(object_ref))
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(container = %object_ref.container_id, key = %object_ref.key, "Fetch failed: {e}");
                return ProcessingOutcome::source_failure(object_ref.clone(), None, e);
            }
        };

        let digest = content_digest(&bytes);
        let size = bytes.len();

        let decoded = match self.transcoder.decode(bytes).await {
            Ok(decoded) => Arc::new(decoded),
            Err(e) => {
                tracing::warn!(container = %object_ref.container_id, key = %object_ref.key, "Decode failed: {e}");
                return ProcessingOutcome::source_failure(object_ref.clone(), Some(digest), e);
            }
        };

        tracing::debug!(
            key = %object_ref.key,
            width = decoded.width,
            height = decoded.height,
            size,
            "Decoded source"
        );

        let mut variants = Vec::with_capacity(specs.len());
        for spec in specs {
            let key = spec.destination_key(object_ref);
            let result = self.deliver(&decoded, spec, &key).await;
            match &result {
                Ok(()) => {
                    tracing::debug!(key = %key, width = spec.target_width, "Variant delivered");
                }
                Err(e) if e.needs_operator() => {
                    tracing::error!(key = %key, width = spec.target_width, alert = true, "Variant encode failed: {e}");
                }
                Err(e) => {
                    tracing::warn!(key = %key, width = spec.target_width, "Variant failed: {e}");
                }
            }
            variants.push(VariantOutcome {
                spec: spec.clone(),
                key,
                result,
            });
        }

        ProcessingOutcome::aggregate(object_ref.clone(), Some(digest), variants)
    }

    async fn deliver(
        &self,
        source: &Arc<DecodedImage>,
        spec: &VariantSpec,
        key: &str,
    ) -> Result<(), PipelineError> {
        let bytes = self
            .transcoder
            .render(Arc::clone(source), spec.target_width, spec.format)
            .await?;

        let options = PutOptions {
            visibility: self.visibility,
            content_type: spec.format.content_type().to_string(),
        };
        let target = format!("{}/{}", self.destination, key);
        self.with_store_retry("put", &target, || {
            self.store
                .put(&self.destination, key, bytes.clone(), &options)
        })
        .await
    }

    /// Run a single store call, retrying transient failures in-process.
    async fn with_store_retry<T, F, Fut>(
        &self,
        operation: &str,
        target: &str,
        mut call: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if retry::is_retryable(&e) && attempt < self.store_retry_attempts => {
                    let delay = retry::backoff_duration(attempt, self.retry_delay_ms);
                    tracing::debug!(
                        operation,
                        target,
                        attempt = attempt + 1,
                        "Retrying store call in {:?}: {e}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
