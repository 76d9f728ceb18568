// Storage layer (S3-compatible)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{ClientConfig, StorageProvider};
use crate::types::{StorageResult, StorageTarget, TransferDirection, TransferRequest};

pub mod mock;
pub mod s3_client;

pub use mock::MockStorageClient;
pub use s3_client::S3Client;

/// Upload/download capability shared by the live client and the test double.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stream a local file to `bucket/key`, replacing any existing object.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()>;

    /// Copy `bucket/key` into `local_path`, creating or truncating it.
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()>;

    async fn transfer(&self, request: &TransferRequest) -> StorageResult<()> {
        let target = &request.target;
        match request.direction {
            TransferDirection::Upload => {
                self.upload(request.local_path(), &target.bucket, &target.key)
                    .await
            }
            TransferDirection::Download => {
                self.download(&target.bucket, &target.key, request.local_path())
                    .await
            }
        }
    }
}

/// Build the storage backend selected by `config.provider`.
pub fn connect(config: &ClientConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
    let storage: Arc<dyn ObjectStorage> = match config.provider {
        StorageProvider::S3 => Arc::new(S3Client::new(config)?),
        StorageProvider::Mock => Arc::new(MockStorageClient::new()),
    };
    info!("Storage backend ready: {}", config.provider);
    Ok(storage)
}

/// A storage handle bound to one bucket.
#[derive(Clone)]
pub struct BucketHandle {
    storage: Arc<dyn ObjectStorage>,
    bucket: String,
}

impl BucketHandle {
    pub fn new(storage: Arc<dyn ObjectStorage>, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.bucket
    }

    pub fn target(&self, key: &str) -> StorageResult<StorageTarget> {
        StorageTarget::new(self.bucket.as_str(), key)
    }

    pub async fn upload(&self, local_path: &Path, key: &str) -> StorageResult<()> {
        self.storage.upload(local_path, &self.bucket, key).await
    }

    pub async fn download(&self, key: &str, local_path: &Path) -> StorageResult<()> {
        self.storage.download(&self.bucket, key, local_path).await
    }
}
