// In-memory test double for ObjectStorage

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::ObjectStorage;
use crate::types::{StorageResult, StorageTarget, TransferDirection, TransferRequest};

/// Records every call and reports success without touching the network or
/// the local filesystem.
#[derive(Clone, Default)]
pub struct MockStorageClient {
    calls: Arc<RwLock<Vec<TransferRequest>>>,
}

impl MockStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, request: TransferRequest) {
        debug!("Mock storage recorded: {}", request);
        self.calls.write().await.push(request);
    }

    /// All recorded calls in invocation order.
    pub async fn calls(&self) -> Vec<TransferRequest> {
        self.calls.read().await.clone()
    }

    pub async fn uploads(&self) -> Vec<TransferRequest> {
        self.filtered(TransferDirection::Upload).await
    }

    pub async fn downloads(&self) -> Vec<TransferRequest> {
        self.filtered(TransferDirection::Download).await
    }

    pub async fn clear(&self) {
        self.calls.write().await.clear();
    }

    async fn filtered(&self, direction: TransferDirection) -> Vec<TransferRequest> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.direction == direction)
            .cloned()
            .collect()
    }
}

fn target(bucket: &str, key: &str) -> StorageTarget {
    StorageTarget {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl ObjectStorage for MockStorageClient {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(TransferRequest::upload(local_path, target(bucket, key)))
            .await;
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        self.record(TransferRequest::download(target(bucket, key), local_path))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test]
    async fn test_records_calls_without_io() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("never-created.bin");
        let mock = MockStorageClient::new();

        mock.upload(&missing, "mybucket", "test.txt").await.unwrap();
        mock.download("mybucket", "test.txt", &missing).await.unwrap();

        // Neither call touched the filesystem.
        assert!(!missing.exists());

        let uploads = mock.uploads().await;
        let downloads = mock.downloads().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(downloads.len(), 1);
        assert_eq!(uploads[0].target.to_string(), "s3://mybucket/test.txt");
        assert_eq!(downloads[0].local_path(), missing.as_path());
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let mock = MockStorageClient::new();
        let clone = mock.clone();

        clone.upload(Path::new("a.txt"), "b", "a.txt").await.unwrap();
        assert_eq!(mock.calls().await.len(), 1);

        mock.clear().await;
        assert!(clone.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_calls_on_shared_instance() {
        let mock = Arc::new(MockStorageClient::new());

        let tasks = (0..32).map(|i| {
            let mock = mock.clone();
            tokio::spawn(async move {
                let key = format!("objects/{}.bin", i);
                let path = format!("local/{}.bin", i);
                if i % 2 == 0 {
                    mock.upload(Path::new(&path), "shared", &key).await
                } else {
                    mock.download("shared", &key, Path::new(&path)).await
                }
            })
        });

        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let calls = mock.calls().await;
        assert_eq!(calls.len(), 32);
        assert_eq!(mock.uploads().await.len(), 16);
        for i in 0..32 {
            let key = format!("objects/{}.bin", i);
            let call = calls.iter().find(|c| c.target.key == key).unwrap();
            assert_eq!(call.local_path, Path::new(&format!("local/{}.bin", i)));
        }
    }
}
