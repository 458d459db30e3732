use crate::error::{PipelineError, Result};
use crate::models::PollOutcome;
use crate::services::storage::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Waits for a key to appear in a bucket using bounded `head` probes.
///
/// The wait between probes is a timer suspension, so dropping the future
/// cancels the poll at the next await point.
pub struct Poller {
    storage: Arc<dyn ObjectStore>,
    max_attempts: u32,
    interval: Duration,
}

impl Poller {
    pub fn new(storage: Arc<dyn ObjectStore>, max_attempts: u32, interval: Duration) -> Self {
        Self {
            storage,
            max_attempts,
            interval,
        }
    }

    pub fn with_defaults(storage: Arc<dyn ObjectStore>) -> Self {
        Self::new(storage, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Probes `bucket/key` up to `max_attempts` times.
    ///
    /// `on_attempt(attempt, max_attempts)` is called after every probe that
    /// did not find the object. A probe failure other than "not found"
    /// aborts immediately.
    pub async fn wait_for<F>(&self, bucket: &str, key: &str, mut on_attempt: F) -> Result<PollOutcome>
    where
        F: FnMut(u32, u32) + Send,
    {
        for attempt in 1..=self.max_attempts {
            let exists = self
                .storage
                .head(bucket, key)
                .await
                .map_err(|source| PipelineError::Probe {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source,
                })?;

            if exists {
                debug!("Found s3://{}/{} on attempt {}", bucket, key, attempt);
                return Ok(PollOutcome::Found { attempts: attempt });
            }

            on_attempt(attempt, self.max_attempts);

            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        debug!(
            "Gave up on s3://{}/{} after {} attempts",
            bucket, key, self.max_attempts
        );
        Ok(PollOutcome::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
