use crate::error::{PipelineError, Result};
use std::env;
use std::time::Duration;

/// Connection settings shared by the client and the handler
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// AWS region (default: "us-east-1")
    pub region: String,

    /// Static access key id; the default provider chain is used when unset
    pub access_key_id: Option<String>,

    /// Static secret access key, required together with `access_key_id`
    pub secret_access_key: Option<String>,

    /// Custom endpoint for S3-compatible stores (MinIO, localstack)
    pub endpoint_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            region: env::var("AWS_REGION").unwrap_or(default.region),
            access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            endpoint_url: non_empty_var("S3_ENDPOINT_URL"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) => Err(PipelineError::Config(
                "AWS_SECRET_ACCESS_KEY must be set together with AWS_ACCESS_KEY_ID".to_string(),
            )),
            (None, Some(_)) => Err(PipelineError::Config(
                "AWS_ACCESS_KEY_ID must be set together with AWS_SECRET_ACCESS_KEY".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

/// Settings for the upload/poll/download client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub store: StoreConfig,

    /// Bucket receiving the original uploads
    pub source_bucket: Option<String>,

    /// Bucket the handler writes derivatives into
    pub target_bucket: Option<String>,

    /// Number of existence probes before giving up (default: 30)
    pub max_attempts: u32,

    /// Delay between probes (default: 1s)
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            source_bucket: None,
            target_bucket: None,
            max_attempts: 30,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            store: StoreConfig::from_env(),
            source_bucket: non_empty_var("SOURCE_BUCKET_NAME"),
            target_bucket: non_empty_var("TARGET_BUCKET_NAME"),
            max_attempts: env::var("POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_attempts),
            poll_interval: env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.poll_interval),
        }
    }

    /// Checks everything the workflow needs before any store access.
    pub fn validate(&self) -> Result<Buckets> {
        self.store.validate()?;

        let source = self.source_bucket.clone().ok_or_else(|| {
            PipelineError::Config("SOURCE_BUCKET_NAME is not set".to_string())
        })?;
        let target = self.target_bucket.clone().ok_or_else(|| {
            PipelineError::Config("TARGET_BUCKET_NAME is not set".to_string())
        })?;

        if self.max_attempts == 0 {
            return Err(PipelineError::Config(
                "POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Buckets { source, target })
    }
}

/// Resolved bucket pair used by the client workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub source: String,
    pub target: String,
}

/// Settings for the resize handler
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub store: StoreConfig,

    /// Bucket derivatives are written to; checked per invocation
    pub target_bucket: Option<String>,

    /// Largest allowed width or height in pixels (default: 300)
    pub max_dimension: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            target_bucket: None,
            max_dimension: 300,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            store: StoreConfig::from_env(),
            target_bucket: non_empty_var("TARGET_BUCKET_NAME"),
            max_dimension: env::var("MAX_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(default.max_dimension),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
