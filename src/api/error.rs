use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Message returned when the target bucket is absent. The bucket name and
/// the store's own error stay in the logs.
pub const BUCKET_MISSING_MESSAGE: &str = "Cannot upload the file to the object store";

/// Message returned when sniffing rejects an upload.
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Supported file types: mp4, gif, webm and avi";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadInput(String),

    #[error("Bucket '{0}' does not exist")]
    BucketMissing(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadInput(_) => StatusCode::BAD_REQUEST,
            AppError::BucketMissing(_) | AppError::IoFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Text placed in the `error` field of the response body.
    pub fn public_message(&self) -> String {
        match self {
            AppError::BadInput(msg) | AppError::IoFailure(msg) => msg.clone(),
            AppError::BucketMissing(_) => BUCKET_MISSING_MESSAGE.to_string(),
            AppError::Unauthorized => "Not Authorized".to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoFailure(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::BucketMissing(bucket) => {
                tracing::error!("Bucket '{}' does not exist", bucket);
            }
            AppError::IoFailure(msg) => {
                tracing::error!("I/O failure: {}", msg);
            }
            AppError::BadInput(msg) => {
                tracing::debug!("Rejected request: {}", msg);
            }
            AppError::Unauthorized => {}
        }

        let status = self.status();
        let body = Json(json!({
            "error": self.public_message()
        }));

        if matches!(self, AppError::Unauthorized) {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Uploader API\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}
