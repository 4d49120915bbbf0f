//! Object store clients.
//!
//! A store only moves bytes: it surfaces raw outcomes classified into the
//! [`PipelineError`] taxonomy and leaves retries to the caller.

mod memory;
mod s3;

pub use memory::{MemoryStore, StoredObject};
pub use s3::S3Store;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::{ObjectReference, Visibility};

/// Per-upload metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// Access level threaded through from configuration
    pub visibility: Visibility,
    /// MIME type of the body
    pub content_type: String,
}

/// Key/blob store used for both sources and variants.
///
/// Implementations must be safe to share between concurrent workers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store name for logging (e.g., "s3", "memory").
    fn name(&self) -> &str;

    /// Fetch the full body of `object_ref`.
    ///
    /// `NotFound` if absent, `TransientIo` on network/timeout, `Fatal` on
    /// authorization errors.
    async fn fetch(&self, object_ref: &ObjectReference) -> Result<Vec<u8>, PipelineError>;

    /// Write `bytes` at `container_id`/`key`, overwriting any existing object.
    async fn put(
        &self,
        container_id: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), PipelineError>;
}
