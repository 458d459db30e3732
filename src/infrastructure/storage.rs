use crate::config::StoreConfig;
use crate::error::Result;
use crate::services::storage::S3ObjectStore;
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

/// Builds the S3 client once; callers share it through the returned store.
pub async fn setup_s3_client(config: &StoreConfig) -> Result<aws_sdk_s3::Client> {
    config.validate()?;

    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));

    if let Some(endpoint_url) = &config.endpoint_url {
        info!("☁️  S3 endpoint override: {}", endpoint_url);
        loader = loader.endpoint_url(endpoint_url);
    }

    if let Some((access_key, secret_key)) = config.static_credentials() {
        loader = loader.credentials_provider(Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    }

    let aws_config = loader.load().await;

    // Path-style addressing for S3-compatible endpoints
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    info!("☁️  S3 client ready (region: {})", config.region);
    Ok(aws_sdk_s3::Client::from_conf(s3_config))
}

pub async fn setup_storage(config: &StoreConfig) -> Result<Arc<S3ObjectStore>> {
    let client = setup_s3_client(config).await?;
    Ok(Arc::new(S3ObjectStore::new(client)))
}
