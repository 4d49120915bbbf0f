//! Test doubles and fixtures shared by unit tests.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{LimitsConfig, TranscodeConfig};
use crate::error::PipelineError;
use crate::pipeline::{DeliveryCoordinator, Transcoder};
use crate::store::{MemoryStore, ObjectStore, PutOptions};
use crate::types::{NamingRule, ObjectReference, VariantFormat, VariantSpec, Visibility};

pub(crate) const SOURCE: &str = "uploads";
pub(crate) const DESTINATION: &str = "resized";

/// PNG bytes of a gradient so resized variants are not trivially uniform.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode fixture");
    bytes
}

pub(crate) fn jpeg_specs(widths: &[u32]) -> Vec<VariantSpec> {
    widths
        .iter()
        .map(|&w| VariantSpec::new(w, VariantFormat::Jpeg, NamingRule::default()))
        .collect()
}

pub(crate) fn transient(operation: &'static str, target: &str) -> PipelineError {
    PipelineError::TransientIo {
        operation,
        target: target.to_string(),
        message: "503 Service Unavailable".to_string(),
    }
}

pub(crate) fn coordinator(store: Arc<dyn ObjectStore>) -> DeliveryCoordinator {
    DeliveryCoordinator::new(
        store,
        Transcoder::new(LimitsConfig::default(), &TranscodeConfig::default()),
        DESTINATION,
        Visibility::Private,
    )
}

/// Wraps a [`MemoryStore`], failing calls on chosen keys and tracking
/// fetch concurrency.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    failures: Mutex<HashMap<String, (u32, PipelineError)>>,
    fetch_delay: Option<Duration>,
    active_fetches: AtomicUsize,
    max_active_fetches: AtomicUsize,
    puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Fail the next `times` fetches or puts of `key` with `error`.
    pub fn fail(&self, key: &str, times: u32, error: PipelineError) {
        self.failures
            .lock()
            .unwrap()
            .insert(key.to_string(), (times, error));
    }

    pub fn max_active_fetches(&self) -> usize {
        self.max_active_fetches.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn injected(&self, key: &str) -> Option<PipelineError> {
        let mut failures = self.failures.lock().unwrap();
        let (remaining, error) = failures.get_mut(key)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(error.clone())
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn fetch(&self, object_ref: &ObjectReference) -> Result<Vec<u8>, PipelineError> {
        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_fetches.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let result = match self.injected(&object_ref.key) {
            Some(error) => Err(error),
            None => self.inner.fetch(object_ref).await,
        };
        self.active_fetches.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn put(
        &self,
        container_id: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), PipelineError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.injected(key) {
            return Err(error);
        }
        self.inner.put(container_id, key, bytes, options).await
    }
}
