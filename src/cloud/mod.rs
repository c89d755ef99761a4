//! Cloud transfer: copy a local file to or from an object store bucket.
//!
//! Bytes are moved as-is; nothing is compressed here. Credentials, retries
//! and the wire protocol all belong to the SDK behind each backend.

mod gcs;
mod s3;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::info;

use crate::compressor::staging_file;
use crate::error::{ArchiveError, Result};

pub use gcs::GcsStore;
pub use s3::S3Store;

#[async_trait]
pub trait CloudStore: Send + Sync {
    /// Short provider name used in logs and errors.
    fn provider(&self) -> &'static str;

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()>;

    async fn download(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    S3,
    Gcs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Upload,
    Download,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transfer::Upload => f.write_str("upload"),
            Transfer::Download => f.write_str("download"),
        }
    }
}

/// Run one transfer against `store`.
pub async fn transfer(
    store: &dyn CloudStore,
    op: Transfer,
    local_path: &Path,
    bucket: &str,
    key: &str,
) -> Result<()> {
    match op {
        Transfer::Upload => {
            if !local_path.is_file() {
                return Err(ArchiveError::SourceNotFound(local_path.to_path_buf()));
            }
            store.upload(local_path, bucket, key).await?;
            info!(
                "File '{}' uploaded to {} bucket '{}' with key '{}'",
                local_path.display(),
                store.provider(),
                bucket,
                key
            );
        }
        Transfer::Download => {
            store.download(local_path, bucket, key).await?;
            info!(
                "File '{}' downloaded from {} bucket '{}' with key '{}'",
                local_path.display(),
                store.provider(),
                bucket,
                key
            );
        }
    }
    Ok(())
}

/// Build the backend for `provider` once and run the transfer on a fresh
/// Tokio runtime. The compression path never needs a runtime, so it is only
/// created here.
pub fn run(
    provider: Provider,
    op: Transfer,
    local_path: &Path,
    bucket: &str,
    key: &str,
) -> Result<()> {
    let name = match provider {
        Provider::S3 => "s3",
        Provider::Gcs => "gcs",
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| transfer_error(name, bucket, key, e))?;

    runtime.block_on(async {
        let store: Box<dyn CloudStore> = match provider {
            Provider::S3 => Box::new(S3Store::from_env().await),
            Provider::Gcs => Box::new(GcsStore::from_env()),
        };
        transfer(store.as_ref(), op, local_path, bucket, key).await
    })
}

pub(crate) fn transfer_error(
    provider: &'static str,
    bucket: &str,
    key: &str,
    cause: impl fmt::Display,
) -> ArchiveError {
    ArchiveError::CloudTransferError {
        provider,
        bucket: bucket.to_string(),
        key: key.to_string(),
        cause: cause.to_string(),
    }
}

/// Temporary file next to `local_path` that downloads stream into before
/// being renamed over the target.
pub(crate) struct PendingDownload {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl PendingDownload {
    pub(crate) fn create(local_path: &Path) -> std::io::Result<Self> {
        let parent = match local_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        Ok(Self {
            tmp: staging_file(parent)?,
            target: local_path.to_path_buf(),
        })
    }

    /// Async handle onto the temporary file.
    pub(crate) fn file(&self) -> std::io::Result<tokio::fs::File> {
        Ok(tokio::fs::File::from_std(self.tmp.reopen()?))
    }

    pub(crate) fn commit(self) -> std::io::Result<()> {
        self.tmp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}
