use crate::api::error::AppError;
use crate::services::staging::StagedFile;
use crate::services::storage::{ObjectAttrs, ObjectStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Length of the random component of an object key.
pub const OBJECT_ID_LEN: usize = 16;

/// Prefix under which all uploads are published.
pub const MEDIA_PREFIX: &str = "media";

/// A staged file after it reached the object store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublishedObject {
    pub bucket: String,
    pub key: String,
    pub attrs: ObjectAttrs,
}

impl PublishedObject {
    /// Name the store assigned to the object.
    pub fn name(&self) -> &str {
        &self.attrs.name
    }
}

/// `media/<YYYY>/<MM>/<DD>/<id><ext>` for the given instant.
pub fn object_key(now: DateTime<Utc>, id: &str, extension: &str) -> String {
    format!(
        "{}/{}/{}{}",
        MEDIA_PREFIX,
        now.format("%Y/%m/%d"),
        id,
        extension
    )
}

/// Random alphanumeric identifier drawn from the thread-local CSPRNG.
pub fn random_object_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OBJECT_ID_LEN)
        .map(char::from)
        .collect()
}

pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Publishes `staged` to `bucket` under a fresh date-partitioned key.
    ///
    /// The whole operation runs under the configured deadline; running out
    /// of time is an `IoFailure` like any other store error.
    pub async fn publish(
        &self,
        staged: &StagedFile,
        bucket: &str,
    ) -> Result<PublishedObject, AppError> {
        match tokio::time::timeout(self.timeout, self.publish_inner(staged, bucket)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "Publishing {} to bucket {} timed out after {:?}",
                    staged.original_name(),
                    bucket,
                    self.timeout
                );
                Err(AppError::IoFailure(format!(
                    "Publishing to the object store timed out after {} seconds",
                    self.timeout.as_secs_f64()
                )))
            }
        }
    }

    async fn publish_inner(
        &self,
        staged: &StagedFile,
        bucket: &str,
    ) -> Result<PublishedObject, AppError> {
        // 1. Bucket must exist
        let exists = self.store.bucket_exists(bucket).await.map_err(|e| {
            AppError::IoFailure(format!("Cannot check bucket: {}", e))
        })?;
        if !exists {
            return Err(AppError::BucketMissing(bucket.to_string()));
        }

        // 2. Destination key
        let key = object_key(Utc::now(), &random_object_id(), &staged.extension());

        // 3. Stream the staged bytes; the store acknowledges before returning
        tracing::info!(
            "Publishing {} ({} bytes) to {}/{}",
            staged.original_name(),
            staged.size(),
            bucket,
            key
        );
        self.store
            .put_file(bucket, &key, staged.path(), Some(staged.mime()))
            .await
            .map_err(|e| AppError::IoFailure(format!("Upload failed: {}", e)))?;

        // 4. Store-assigned attributes
        let attrs = self
            .store
            .object_attrs(bucket, &key)
            .await
            .map_err(|e| AppError::IoFailure(format!("Cannot read object attributes: {}", e)))?;

        Ok(PublishedObject {
            bucket: bucket.to_string(),
            key,
            attrs,
        })
    }
}
