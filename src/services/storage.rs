use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

/// Attributes the store assigns to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ObjectAttrs {
    pub bucket: String,
    pub name: String,
    pub size: i64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Durable blob storage used to publish staged uploads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(false)` when the bucket does not exist, `Err` when the store
    /// could not answer.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Streams the file at `path` to `bucket/key`. Returns once the store has
    /// acknowledged the write.
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<()>;

    async fn object_attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs>;
}

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let res = self.client.head_bucket().bucket(bucket).send().await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<()> {
        let body = ByteStream::from_path(path).await?;

        let res = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(body)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                bucket,
                key,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }

    async fn object_attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs> {
        let res = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;

        let last_modified = res
            .last_modified
            .and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()));

        Ok(ObjectAttrs {
            bucket: bucket.to_string(),
            name: key.to_string(),
            size: res.content_length.unwrap_or(0),
            content_type: res.content_type,
            etag: res.e_tag,
            last_modified,
        })
    }
}
