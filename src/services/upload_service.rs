use crate::api::error::AppError;
use crate::services::publisher::{PublishedObject, Publisher};
use crate::services::staging::StagingWriter;
use crate::utils::validation::sanitize_filename;
use tokio::io::AsyncRead;

/// Result of pushing one file through the pipeline.
pub type UploadOutcome = Result<PublishedObject, AppError>;

/// Runs stage → publish → cleanup for uploaded files.
pub struct UploadService {
    staging: StagingWriter,
    publisher: Publisher,
    bucket: String,
}

impl UploadService {
    pub fn new(staging: StagingWriter, publisher: Publisher, bucket: String) -> Self {
        Self {
            staging,
            publisher,
            bucket,
        }
    }

    /// Uploads a single file.
    ///
    /// Once staging succeeded the local copy is removed whatever the publish
    /// outcome. A failed removal is logged and never replaces the publish
    /// result.
    pub async fn upload<R>(&self, filename: &str, reader: R) -> UploadOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        let display_name = sanitize_filename(filename);

        // 1. Stage (removes its own partial file on failure)
        let staged = self.staging.stage(reader, filename).await?;

        // 2. Publish
        let published = self.publisher.publish(&staged, &self.bucket).await;

        // 3. Cleanup, always
        let staged_path = staged.path().to_path_buf();
        if let Err(e) = staged.cleanup() {
            tracing::warn!(
                "Failed to remove staged file {} for {}: {}",
                staged_path.display(),
                display_name,
                e
            );
        }

        match &published {
            Ok(object) => tracing::info!(
                "✅ Uploaded {} as {}/{}",
                display_name,
                object.bucket,
                object.key
            ),
            Err(e) => tracing::warn!("Upload of {} failed: {}", display_name, e),
        }

        published
    }

    /// Starts the bookkeeping of a batch request.
    pub fn begin_batch(&self, max_files: usize) -> BatchUpload<'_> {
        BatchUpload {
            service: self,
            max_files,
            published: Vec::new(),
        }
    }
}

/// Sequential batch upload.
///
/// The first failing file aborts the batch. Files published before the
/// failure stay in the store; the error names the failing file and how many
/// were already published so clients can tell what happened.
pub struct BatchUpload<'a> {
    service: &'a UploadService,
    max_files: usize,
    published: Vec<PublishedObject>,
}

impl BatchUpload<'_> {
    pub fn published(&self) -> &[PublishedObject] {
        &self.published
    }

    /// Uploads the next file of the batch.
    pub async fn upload<R>(&mut self, filename: &str, reader: R) -> Result<(), AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let position = self.published.len() + 1;
        if position > self.max_files {
            return Err(self.abort(
                position,
                filename,
                AppError::BadInput(format!(
                    "Too many files: at most {} per batch",
                    self.max_files
                )),
            ));
        }

        match self.service.upload(filename, reader).await {
            Ok(object) => {
                self.published.push(object);
                Ok(())
            }
            Err(e) => Err(self.abort(position, filename, e)),
        }
    }

    /// Completes the batch. An empty batch is rejected.
    pub fn finish(self) -> Result<Vec<PublishedObject>, AppError> {
        if self.published.is_empty() {
            return Err(AppError::BadInput("No files provided".to_string()));
        }
        tracing::info!("Batch of {} files uploaded", self.published.len());
        Ok(self.published)
    }

    fn abort(&self, position: usize, filename: &str, cause: AppError) -> AppError {
        let name = sanitize_filename(filename);
        if !self.published.is_empty() {
            let keys: Vec<&str> = self.published.iter().map(|o| o.key.as_str()).collect();
            tracing::warn!(
                "Batch aborted at file {} ({}); already published objects are kept: {:?}",
                position,
                name,
                keys
            );
        }

        let context = format!(
            "file {} ({}) failed, {} earlier file(s) already published",
            position,
            name,
            self.published.len()
        );

        match cause {
            AppError::BadInput(msg) => AppError::BadInput(format!("{}: {}", context, msg)),
            AppError::IoFailure(msg) => AppError::IoFailure(format!("{}: {}", context, msg)),
            other => other,
        }
    }
}
