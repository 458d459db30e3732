use crate::config::HandlerConfig;
use crate::error::{PipelineError, Result};
use crate::models::{BatchSummary, NotificationRecord, derived_key};
use crate::services::resizer::{ResizedImage, Resizer, format_name};
use crate::services::storage::ObjectStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Resizes newly created source objects into the target bucket.
///
/// Stateless between invocations; records within a batch are processed
/// one after another and a failing record never stops the rest.
pub struct ResizeHandler {
    storage: Arc<dyn ObjectStore>,
    resizer: Resizer,
    target_bucket: Option<String>,
}

impl ResizeHandler {
    pub fn new(storage: Arc<dyn ObjectStore>, config: &HandlerConfig) -> Self {
        Self {
            storage,
            resizer: Resizer::new(config.max_dimension),
            target_bucket: config.target_bucket.clone(),
        }
    }

    pub async fn handle_batch(&self, records: &[NotificationRecord]) -> Result<BatchSummary> {
        let target_bucket = self.target_bucket.as_deref().ok_or_else(|| {
            error!("TARGET_BUCKET_NAME is not configured, refusing to process batch");
            PipelineError::Config("TARGET_BUCKET_NAME is not set".to_string())
        })?;

        if records.is_empty() {
            warn!("No records found in notification batch");
        }

        let mut summary = BatchSummary::default();

        for record in records {
            info!("Processing s3://{}/{}", record.bucket, record.key);

            match self.process_record(record, target_bucket).await {
                Ok((key, image)) => {
                    info!(
                        "✅ Wrote s3://{}/{} ({}x{}, {}, {} bytes)",
                        target_bucket,
                        key,
                        image.width,
                        image.height,
                        format_name(image.format),
                        image.data.len()
                    );
                    summary.processed += 1;
                    summary.written_keys.push(key);
                }
                Err(e) => {
                    error!(
                        bucket = %record.bucket,
                        key = %record.key,
                        "❌ Failed to process record: {}",
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Batch complete: {} processed, {} failed",
            summary.processed, summary.failed
        );
        Ok(summary)
    }

    /// Counts records that could not even be decoded from the notification
    /// envelope as failures, then handles the rest.
    pub async fn handle_with_rejected(
        &self,
        records: &[NotificationRecord],
        rejected: usize,
    ) -> Result<BatchSummary> {
        let mut summary = self.handle_batch(records).await?;
        summary.failed += rejected;
        Ok(summary)
    }

    async fn process_record(
        &self,
        record: &NotificationRecord,
        target_bucket: &str,
    ) -> Result<(String, ResizedImage)> {
        let data = self
            .storage
            .get(&record.bucket, &record.key)
            .await
            .map_err(|source| PipelineError::Fetch {
                bucket: record.bucket.clone(),
                key: record.key.clone(),
                source,
            })?;

        let image = self.resizer.resize_async(data).await?;
        if !image.resized {
            info!(
                "Image already small ({}x{}), no resize needed",
                image.width, image.height
            );
        }

        let key = derived_key(&record.key);
        let content_type = image.content_type();
        self.storage
            .put(target_bucket, &key, image.data.clone(), Some(&content_type))
            .await
            .map_err(|source| PipelineError::Store {
                bucket: target_bucket.to_string(),
                key: key.clone(),
                source,
            })?;

        Ok((key, image))
    }
}
