//! Live S3 client built on `rust-s3`.
//!
//! Region and credentials are resolved once in [`S3Client::new`] and shared by
//! every call; temporary credentials are refreshed once they expire. A per-call
//! `Bucket` handle is cheap to build and carries no connection state of its own.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use s3::bucket::CHUNK_SIZE;
use s3::creds::time::OffsetDateTime;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::serde_types::Part;
use s3::utils::read_chunk_async;
use s3::Bucket;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::ObjectStorage;
use crate::config::{ClientConfig, CredentialSource};
use crate::types::{StorageError, StorageResult, StorageTarget, TransferDirection};

/// Cipher designation sent with `x-amz-server-side-encryption`.
pub const SSE_ALGORITHM: &str = "AES256";
const ACL_PRIVATE: &str = "private";
const DISPOSITION_ATTACHMENT: &str = "attachment";
const CONTENT_TYPE: &str = "application/octet-stream";

pub struct S3Client {
    region: Region,
    credentials: Arc<RwLock<Credentials>>,
    path_style: bool,
    encrypt_at_rest: bool,
}

impl S3Client {
    /// Resolve region and credentials. Fails when no credentials can be found.
    pub fn new(config: &ClientConfig) -> StorageResult<Self> {
        if config.region.trim().is_empty() {
            return Err(StorageError::Configuration("region is empty".to_string()));
        }

        let region = match &config.endpoint {
            Some(endpoint) => {
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                    return Err(StorageError::Configuration(format!(
                        "endpoint {:?} must start with http:// or https://",
                        endpoint
                    )));
                }
                Region::Custom {
                    region: config.region.clone(),
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                }
            }
            None => config.region.parse::<Region>().map_err(|e| {
                StorageError::Configuration(format!("invalid region {:?}: {}", config.region, e))
            })?,
        };

        let credentials = resolve_credentials(&config.credentials)?;

        info!(
            "Initialized S3 client (region: {}, endpoint: {}, encryption: {})",
            config.region,
            config.endpoint.as_deref().unwrap_or("default"),
            config.encrypt_at_rest
        );

        Ok(Self {
            region,
            credentials: Arc::new(RwLock::new(credentials)),
            path_style: config.path_style,
            encrypt_at_rest: config.encrypt_at_rest,
        })
    }

    /// Current credentials, re-resolved through the chain once expired.
    async fn current_credentials(&self) -> StorageResult<Credentials> {
        {
            let credentials = self.credentials.read().await;
            if !is_expired(&credentials, OffsetDateTime::now_utc()) {
                return Ok(credentials.clone());
            }
        }

        let mut credentials = self.credentials.write().await;
        debug!("Refreshing expired S3 credentials");
        credentials
            .refresh()
            .map_err(|e| StorageError::Credentials(e.to_string()))?;
        Ok(credentials.clone())
    }

    async fn bucket(&self, target: &StorageTarget) -> StorageResult<Bucket> {
        let credentials = self.current_credentials().await?;
        let bucket = Bucket::new(&target.bucket, self.region.clone(), credentials).map_err(|e| {
            StorageError::Configuration(format!("bucket {:?}: {}", target.bucket, e))
        })?;

        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }

    /// Bucket handle carrying the object-level headers. Only the single PUT and
    /// the multipart initiate request may use it.
    async fn upload_bucket(&self, target: &StorageTarget) -> StorageResult<Bucket> {
        let mut bucket = self.bucket(target).await?;
        if self.encrypt_at_rest {
            bucket.add_header("x-amz-server-side-encryption", SSE_ALGORITHM);
        }
        bucket.add_header("x-amz-acl", ACL_PRIVATE);
        bucket.add_header("Content-Disposition", DISPOSITION_ATTACHMENT);
        Ok(bucket)
    }

    async fn put_multipart(&self, target: &StorageTarget, file: &mut File) -> StorageResult<()> {
        let fail = |e: S3Error| StorageError::transfer_failed(TransferDirection::Upload, target, e);

        let initiated = self
            .upload_bucket(target)
            .await?
            .initiate_multipart_upload(&target.key, CONTENT_TYPE)
            .await
            .map_err(fail)?;

        let bucket = self.bucket(target).await?;
        let path = initiated.key.as_str();
        let upload_id = initiated.upload_id.as_str();

        if let Err(e) = put_parts(&bucket, path, upload_id, file).await {
            if let Err(abort) = bucket.abort_upload(path, upload_id).await {
                warn!("Failed to abort multipart upload {} for {}: {}", upload_id, target, abort);
            }
            return Err(fail(e));
        }
        Ok(())
    }
}

/// Parts and completion go through a header-free bucket: S3 rejects SSE-S3
/// headers on UploadPart.
async fn put_parts(
    bucket: &Bucket,
    path: &str,
    upload_id: &str,
    file: &mut File,
) -> Result<(), S3Error> {
    let mut parts: Vec<Part> = Vec::new();
    loop {
        let chunk = read_chunk_async(file).await?;
        let last = chunk.len() < CHUNK_SIZE;
        if !chunk.is_empty() || parts.is_empty() {
            let part_number = parts.len() as u32 + 1;
            debug!("Uploading part {} ({} bytes) of {}", part_number, chunk.len(), path);
            parts.push(
                bucket
                    .put_multipart_chunk(chunk, path, part_number, upload_id, CONTENT_TYPE)
                    .await?,
            );
        }
        if last {
            break;
        }
    }

    let response = bucket
        .complete_multipart_upload(path, upload_id, parts)
        .await?;
    if response.status_code() >= 300 {
        return Err(S3Error::HttpFailWithBody(
            response.status_code(),
            String::from_utf8_lossy(response.as_slice()).into_owned(),
        ));
    }
    Ok(())
}

fn is_expired(credentials: &Credentials, now: OffsetDateTime) -> bool {
    credentials
        .expiration
        .map_or(false, |expiration| *expiration <= now)
}

fn resolve_credentials(source: &CredentialSource) -> StorageResult<Credentials> {
    let resolved = match source {
        CredentialSource::Chain => Credentials::default(),
        CredentialSource::Profile { name } => Credentials::from_profile(Some(name.as_str())),
        CredentialSource::Static {
            access_key_id,
            secret_access_key,
            session_token,
        } => Credentials::new(
            Some(access_key_id.as_str()),
            Some(secret_access_key.as_str()),
            None,
            session_token.as_deref(),
            None,
        ),
    };

    resolved.map_err(|e| StorageError::Credentials(e.to_string()))
}

fn is_not_found(err: &S3Error) -> bool {
    matches!(err, S3Error::HttpFailWithBody(404, _))
}

#[async_trait]
impl ObjectStorage for S3Client {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        let target = StorageTarget::new(bucket, key)?;

        let not_found = |source: std::io::Error| StorageError::FileNotFound {
            path: local_path.to_path_buf(),
            source,
        };
        let mut file = File::open(local_path).await.map_err(not_found)?;
        let metadata = file.metadata().await.map_err(not_found)?;
        if !metadata.is_file() {
            return Err(not_found(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        debug!(
            "Uploading {} ({} bytes) to {}",
            local_path.display(),
            metadata.len(),
            target
        );

        if metadata.len() < CHUNK_SIZE as u64 {
            self.upload_bucket(&target)
                .await?
                .put_object_stream(&mut file, &target.key)
                .await
                .map_err(|e| StorageError::transfer_failed(TransferDirection::Upload, &target, e))?;
        } else {
            self.put_multipart(&target, &mut file).await?;
        }

        info!("Uploaded {} to {}", local_path.display(), target);
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        let target = StorageTarget::new(bucket, key)?;

        let mut file = File::create(local_path)
            .await
            .map_err(|source| StorageError::FileCreateFailed {
                path: local_path.to_path_buf(),
                source,
            })?;

        debug!("Downloading {} to {}", target, local_path.display());

        let result = self
            .bucket(&target)
            .await?
            .get_object_to_writer(&target.key, &mut file)
            .await;
        let status = match result {
            Ok(status) => status,
            Err(e) if is_not_found(&e) => {
                return Err(StorageError::ObjectNotFound {
                    bucket: target.bucket,
                    key: target.key,
                })
            }
            Err(e) => {
                return Err(StorageError::transfer_failed(
                    TransferDirection::Download,
                    &target,
                    e,
                ))
            }
        };

        match status {
            200..=299 => {}
            404 => {
                return Err(StorageError::ObjectNotFound {
                    bucket: target.bucket,
                    key: target.key,
                })
            }
            other => {
                return Err(StorageError::transfer_failed(
                    TransferDirection::Download,
                    &target,
                    format!("unexpected HTTP status {}", other),
                ))
            }
        }

        file.flush()
            .await
            .map_err(|e| StorageError::transfer_failed(TransferDirection::Download, &target, e))?;

        info!("Downloaded {} to {}", target, local_path.display());
        Ok(())
    }
}
