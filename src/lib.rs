// Object Transfer - thin upload/download facade over S3-compatible storage

pub mod config;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use crate::config::{ClientConfig, CredentialSource, StorageProvider};
pub use crate::storage::{connect, BucketHandle, MockStorageClient, ObjectStorage, S3Client};
pub use crate::types::{StorageError, StorageResult, StorageTarget, TransferDirection, TransferRequest};
