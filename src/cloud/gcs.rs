//! Google Cloud Storage backend on top of object_store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use object_store::ObjectStore;
use object_store::buffered::BufWriter;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{CloudStore, PendingDownload, transfer_error};
use crate::error::Result;

const PROVIDER: &str = "gcs";

/// Holds the credential/config builder resolved once from the environment
/// (`GOOGLE_SERVICE_ACCOUNT`, `GOOGLE_APPLICATION_CREDENTIALS`, ...); a
/// store per bucket is derived from it on demand.
pub struct GcsStore {
    builder: GoogleCloudStorageBuilder,
}

impl GcsStore {
    pub fn from_env() -> Self {
        Self {
            builder: GoogleCloudStorageBuilder::from_env(),
        }
    }

    fn bucket(&self, bucket: &str, key: &str) -> Result<Arc<dyn ObjectStore>> {
        let store = self
            .builder
            .clone()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| transfer_error(PROVIDER, bucket, key, e))?;
        Ok(Arc::new(store))
    }
}

#[async_trait]
impl CloudStore for GcsStore {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let store = self.bucket(bucket, key)?;
        let io_err = |e: std::io::Error| transfer_error(PROVIDER, bucket, key, e);

        let mut file = tokio::fs::File::open(local_path).await.map_err(io_err)?;
        let mut writer = BufWriter::new(store, ObjectPath::from(key));
        match tokio::io::copy(&mut file, &mut writer).await {
            Ok(n) => {
                writer.shutdown().await.map_err(io_err)?;
                debug!(bytes = n, "uploaded gs://{bucket}/{key}");
                Ok(())
            }
            Err(e) => {
                // abort the pending multipart upload
                let _ = writer.abort().await;
                Err(io_err(e))
            }
        }
    }

    async fn download(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let store = self.bucket(bucket, key)?;
        let store_err = |e: object_store::Error| transfer_error(PROVIDER, bucket, key, e);
        let io_err = |e: std::io::Error| transfer_error(PROVIDER, bucket, key, e);

        let result = store
            .get(&ObjectPath::from(key))
            .await
            .map_err(store_err)?;

        let pending = PendingDownload::create(local_path).map_err(io_err)?;
        let mut file = pending.file().map_err(io_err)?;
        let mut stream = result.into_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(store_err)?;
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        drop(file);

        pending.commit().map_err(io_err)?;
        debug!(bytes = written, "downloaded gs://{bucket}/{key}");
        Ok(())
    }
}
