//! Object storage client seam (§4.7): a one-method trait so the processor
//! never depends on the concrete AWS SDK types, and tests can substitute
//! an in-memory fake instead of a live bucket.

use std::collections::HashMap;
use std::sync::Mutex;

use aws_sdk_s3::Client as S3Client;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("object '{0}' not found")]
    NotFound(String),
    #[error("blob store error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Fetch-by-key access to the CSV objects the worker ingests.
pub trait BlobStore: Send + Sync {
    fn fetch(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, BlobError>> + Send;
}

/// Production blob store, backed by an S3-compatible bucket.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

impl BlobStore for S3BlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(e) if e.is_no_such_key() => BlobError::NotFound(key.to_string()),
                _ => BlobError::Backend(anyhow::anyhow!(err)),
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| BlobError::Backend(anyhow::anyhow!(err)))?
            .into_bytes();

        Ok(bytes.to_vec())
    }
}

/// In-memory blob store for tests: a plain map of key to bytes.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .expect("in-memory blob store mutex poisoned")
            .insert(key.into(), bytes.into());
    }
}

impl BlobStore for InMemoryBlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        self.objects
            .lock()
            .expect("in-memory blob store mutex poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_a_stored_object() {
        let store = InMemoryBlobStore::new();
        store.put("jobs/1.csv", b"hello".to_vec());

        let bytes = store.fetch("jobs/1.csv").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryBlobStore::new();
        let err = store.fetch("missing").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }
}
