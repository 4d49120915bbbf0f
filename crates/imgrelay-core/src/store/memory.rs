//! In-process object store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::PipelineError;
use crate::types::{ObjectReference, Visibility};

use super::{ObjectStore, PutOptions};

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub visibility: Visibility,
}

/// HashMap-backed store keyed by `(container, key)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing `put`.
    pub fn insert(&self, container_id: &str, key: &str, bytes: Vec<u8>) {
        let object = StoredObject {
            bytes,
            content_type: "application/octet-stream".to_string(),
            visibility: Visibility::Private,
        };
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((container_id.to_string(), key.to_string()), object);
    }

    /// Look up an object.
    pub fn get(&self, container_id: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(container_id.to_string(), key.to_string()))
            .cloned()
    }

    /// Sorted keys present in `container_id`.
    pub fn keys(&self, container_id: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|(c, _)| c == container_id)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Total number of objects across containers.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, object_ref: &ObjectReference) -> Result<Vec<u8>, PipelineError> {
        self.get(&object_ref.container_id, &object_ref.key)
            .map(|object| object.bytes)
            .ok_or_else(|| PipelineError::NotFound {
                container: object_ref.container_id.clone(),
                key: object_ref.key.clone(),
            })
    }

    async fn put(
        &self,
        container_id: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), PipelineError> {
        let object = StoredObject {
            bytes,
            content_type: options.content_type.clone(),
            visibility: options.visibility,
        };
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((container_id.to_string(), key.to_string()), object);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .fetch(&ObjectReference::new("uploads", "missing.png"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::NotFound {
                container: "uploads".to_string(),
                key: "missing.png".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_put_overwrites_and_records_options() {
        let store = MemoryStore::new();
        let options = PutOptions {
            visibility: Visibility::PublicRead,
            content_type: "image/jpeg".to_string(),
        };
        store.put("out", "a/100.jpg", vec![1], &options).await.unwrap();
        store.put("out", "a/100.jpg", vec![2], &options).await.unwrap();

        let object = store.get("out", "a/100.jpg").unwrap();
        assert_eq!(object.bytes, vec![2]);
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(object.visibility, Visibility::PublicRead);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_scoped_to_container() {
        let store = MemoryStore::new();
        store.insert("uploads", "b.png", vec![0]);
        store.insert("uploads", "a.png", vec![0]);
        store.insert("other", "c.png", vec![0]);
        assert_eq!(store.keys("uploads"), vec!["a.png", "b.png"]);
        let fetched = store
            .fetch(&ObjectReference::new("other", "c.png"))
            .await
            .unwrap();
        assert_eq!(fetched, vec![0]);
    }
}
