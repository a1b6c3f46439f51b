//! Attachment object store collaborator.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store error: {0}")]
    Backend(String),
}

/// The store that holds uploaded attachments by key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete `key`. Returns false if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

/// Process-local store used in development and tests.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(key.into(), bytes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn delete(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.objects.remove(key).is_some())
    }
}
