use crate::error::{PipelineError, Result};
use crate::models::UploadJob;
use crate::services::storage::ObjectStore;
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

/// Pushes local files into the source bucket under their base name.
pub struct Uploader {
    storage: Arc<dyn ObjectStore>,
}

impl Uploader {
    pub fn new(storage: Arc<dyn ObjectStore>) -> Self {
        Self { storage }
    }

    /// Single attempt, no retry. Returns the key the file was stored under.
    pub async fn upload(&self, job: &UploadJob) -> Result<String> {
        let data = tokio::fs::read(&job.path)
            .await
            .map_err(|e| PipelineError::Upload {
                bucket: job.bucket.clone(),
                key: job.key.clone(),
                source: anyhow::Error::new(e)
                    .context(format!("failed to read {}", job.path.display())),
            })?;

        let size = data.len();
        self.storage
            .put(&job.bucket, &job.key, Bytes::from(data), None)
            .await
            .map_err(|source| PipelineError::Upload {
                bucket: job.bucket.clone(),
                key: job.key.clone(),
                source,
            })?;

        info!(
            "📤 Uploaded {} to s3://{}/{} ({} bytes)",
            job.path.display(),
            job.bucket,
            job.key,
            size
        );
        Ok(job.key.clone())
    }
}
