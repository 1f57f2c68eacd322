use crate::config::S3Settings;
use crate::services::storage::{ObjectStore, S3ObjectStore};
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(settings: &S3Settings, bucket: &str) -> Arc<S3ObjectStore> {
    let mut loader = aws_config::from_env().region(Region::new(settings.region.clone()));

    if let Some(endpoint_url) = &settings.endpoint {
        info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);
        loader = loader.endpoint_url(endpoint_url);
    } else {
        info!("☁️  S3 Storage: AWS {} (Bucket: {})", settings.region, bucket);
    }

    if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(settings.endpoint.is_some())
        .build();

    let store = S3ObjectStore::new(aws_sdk_s3::Client::from_conf(s3_config));

    // Uploads fail with a 500 while the bucket is missing; it is never created here
    match store.bucket_exists(bucket).await {
        Ok(true) => info!("✅ Bucket '{}' is ready", bucket),
        Ok(false) => warn!("🪣 Bucket '{}' does not exist, uploads will fail", bucket),
        Err(e) => warn!("❌ Could not reach bucket '{}': {}", bucket, e),
    }

    Arc::new(store)
}
