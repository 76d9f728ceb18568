// Type definitions and error taxonomy

use std::fmt;
use std::path::{Path, PathBuf};

/// Boxed collaborator error carried by `StorageError::TransferFailed`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Identifies one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageTarget {
    pub bucket: String,
    pub key: String,
}

impl StorageTarget {
    /// Create a target, rejecting an empty bucket or key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> StorageResult<Self> {
        let target = Self {
            bucket: bucket.into(),
            key: key.into(),
        };
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::InvalidTarget(format!(
                "bucket name is empty (key {:?})",
                self.key
            )));
        }
        if self.key.is_empty() {
            return Err(StorageError::InvalidTarget(format!(
                "object key is empty (bucket {:?})",
                self.bucket
            )));
        }
        Ok(())
    }
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Upload,
    Download,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "upload"),
            TransferDirection::Download => write!(f, "download"),
        }
    }
}

/// One upload or download, built per call and dropped when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: TransferDirection,
    pub target: StorageTarget,
    pub local_path: PathBuf,
}

impl TransferRequest {
    pub fn upload(local_path: impl Into<PathBuf>, target: StorageTarget) -> Self {
        Self {
            direction: TransferDirection::Upload,
            target,
            local_path: local_path.into(),
        }
    }

    pub fn download(target: StorageTarget, local_path: impl Into<PathBuf>) -> Self {
        Self {
            direction: TransferDirection::Download,
            target,
            local_path: local_path.into(),
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            TransferDirection::Upload => {
                write!(f, "upload {} -> {}", self.local_path.display(), self.target)
            }
            TransferDirection::Download => {
                write!(f, "download {} -> {}", self.target, self.local_path.display())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Local file not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create local file: {}", path.display())]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Transfer failed ({operation} s3://{bucket}/{key})")]
    TransferFailed {
        operation: TransferDirection,
        bucket: String,
        key: String,
        #[source]
        cause: BoxError,
    },

    #[error("Invalid storage target: {0}")]
    InvalidTarget(String),

    #[error("Credential resolution failed: {0}")]
    Credentials(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl StorageError {
    pub(crate) fn transfer_failed(
        operation: TransferDirection,
        target: &StorageTarget,
        cause: impl Into<BoxError>,
    ) -> Self {
        StorageError::TransferFailed {
            operation,
            bucket: target.bucket.clone(),
            key: target.key.clone(),
            cause: cause.into(),
        }
    }

    /// True when the remote store reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectNotFound { .. })
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_rejects_empty_parts() {
        assert!(matches!(
            StorageTarget::new("", "key"),
            Err(StorageError::InvalidTarget(_))
        ));
        assert!(matches!(
            StorageTarget::new("bucket", ""),
            Err(StorageError::InvalidTarget(_))
        ));
        assert!(StorageTarget::new("bucket", "reports/q3.csv").is_ok());
    }

    #[test]
    fn test_display_context() {
        let target = StorageTarget::new("mybucket", "test.txt").unwrap();
        assert_eq!(target.to_string(), "s3://mybucket/test.txt");

        let request = TransferRequest::download(target.clone(), "out/test.txt");
        assert_eq!(request.to_string(), "download s3://mybucket/test.txt -> out/test.txt");

        let err = StorageError::transfer_failed(TransferDirection::Upload, &target, "access denied");
        assert_eq!(err.to_string(), "Transfer failed (upload s3://mybucket/test.txt)");
        assert_eq!(
            std::error::Error::source(&err).map(|e| e.to_string()),
            Some("access denied".to_string())
        );
    }

    #[test]
    fn test_not_found_is_distinguishable() {
        let missing = StorageError::ObjectNotFound {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        assert!(missing.is_not_found());

        let target = StorageTarget::new("b", "k").unwrap();
        let failed = StorageError::transfer_failed(TransferDirection::Download, &target, "timeout");
        assert!(!failed.is_not_found());
    }
}
