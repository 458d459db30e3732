use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Failed to fetch s3://{bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to upload to s3://{bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Existence check failed for s3://{bucket}/{key}: {source}")]
    Probe {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write s3://{bucket}/{key}: {source}")]
    Store {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("No resized image available")]
    NoResult,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::TaskFailed(e.to_string())
    }
}

impl PipelineError {
    /// Nothing in the pipeline is retried automatically; the only loop is
    /// the existence poll, which is not an error retry.
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub fn is_config(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_name_the_object() {
        let err = PipelineError::Fetch {
            bucket: "source".to_string(),
            key: "cat.png".to_string(),
            source: anyhow::anyhow!("access denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("s3://source/cat.png"));
        assert!(msg.contains("access denied"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancelled_task_is_task_failure() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let join_err = handle.await.unwrap_err();
        let err = PipelineError::from(join_err);
        assert!(matches!(err, PipelineError::TaskFailed(_)));
        assert!(err.to_string().starts_with("Background task failed"));
    }

    #[test]
    fn test_config_error_is_fatal() {
        let err = PipelineError::Config("TARGET_BUCKET_NAME is not set".to_string());
        assert!(err.is_config());
        assert!(!err.is_retryable());
    }
}
