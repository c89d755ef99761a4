//! Amazon S3 backend on top of aws-sdk-s3.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{CloudStore, PendingDownload, transfer_error};
use crate::error::Result;

const PROVIDER: &str = "s3";

/// S3 client wrapper. Built once per process; the SDK client keeps its own
/// connection pool.
pub struct S3Store {
    inner: aws_sdk_s3::Client,
}

impl S3Store {
    /// Load configuration from the standard AWS chain (environment,
    /// shared config/credential files, instance metadata).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            inner: aws_sdk_s3::Client::new(&config),
        }
    }
}

#[async_trait]
impl CloudStore for S3Store {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| transfer_error(PROVIDER, bucket, key, e))?;

        let response = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| transfer_error(PROVIDER, bucket, key, DisplayErrorContext(&e)))?;

        debug!(etag = ?response.e_tag(), "put_object {bucket}/{key}");
        Ok(())
    }

    async fn download(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| transfer_error(PROVIDER, bucket, key, DisplayErrorContext(&e)))?;

        let local_err = |e: std::io::Error| transfer_error(PROVIDER, bucket, key, e);
        let pending = PendingDownload::create(local_path).map_err(local_err)?;
        let mut file = pending.file().map_err(local_err)?;

        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| transfer_error(PROVIDER, bucket, key, e))?
        {
            file.write_all(&chunk).await.map_err(local_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(local_err)?;
        drop(file);

        pending.commit().map_err(local_err)?;
        debug!(bytes = written, "get_object {bucket}/{key}");
        Ok(())
    }
}
