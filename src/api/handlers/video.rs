use crate::AppState;
use crate::api::error::AppError;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::StreamReader;

use super::types::*;

/// Form field of the single-file route.
pub const FILE_FIELD: &str = "file";
/// Form field of the batch route, repeated once per file.
pub const FILES_FIELD: &str = "files";

#[utoipa::path(
    post,
    path = "/v{version}/video",
    params(("version" = String, Path, description = "API version, e.g. 1.0.0")),
    request_body(content = String, content_type = "multipart/form-data", description = "Media file in the `file` field"),
    responses(
        (status = 200, description = "File published", body = UploadResponse),
        (status = 400, description = "Missing file, oversized body, unsupported type or version", body = ErrorResponse),
        (status = 500, description = "Bucket missing or storage failure", body = ErrorResponse)
    ),
    tag = "video"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(rejection_error)?;
    let result: Result<Json<UploadResponse>, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(|e| form_error(&state, e))? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let reader = StreamReader::new(field.map_err(field_error));

            let published = state.upload_service.upload(&filename, reader).await?;
            return Ok(Json(UploadResponse {
                body: published.name().to_string(),
            }));
        }

        Err(AppError::BadInput("No file provided".to_string()))
    }
    .await;

    if let Err(e) = &result {
        drain(&mut multipart, e).await;
    }
    result
}

#[utoipa::path(
    post,
    path = "/v{version}/video/batch",
    params(("version" = String, Path, description = "API version, e.g. 1.0.0")),
    request_body(content = String, content_type = "multipart/form-data", description = "Media files in repeated `files` fields"),
    responses(
        (status = 200, description = "All files published", body = UploadResponse),
        (status = 400, description = "A file was rejected; earlier files stay published", body = ErrorResponse),
        (status = 500, description = "Bucket missing or storage failure", body = ErrorResponse)
    ),
    tag = "video"
)]
pub async fn upload_video_batch(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(rejection_error)?;
    let result: Result<Json<UploadResponse>, AppError> = async {
        let mut batch = state.upload_service.begin_batch(state.config.files_count);

        while let Some(field) = multipart.next_field().await.map_err(|e| form_error(&state, e))? {
            if field.name() != Some(FILES_FIELD) {
                continue;
            }

            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let reader = StreamReader::new(field.map_err(field_error));
            batch.upload(&filename, reader).await?;
        }

        batch.finish()?;
        Ok(Json(UploadResponse {
            body: BATCH_SUCCESS_BODY.to_string(),
        }))
    }
    .await;

    if let Err(e) = &result {
        drain(&mut multipart, e).await;
    }
    result
}

/// The body is not a usable multipart form at all.
fn rejection_error(rejection: MultipartRejection) -> AppError {
    AppError::BadInput(rejection.body_text())
}

fn form_error(state: &AppState, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadInput(format!(
            "Request body exceeds the maximum allowed size of {} MB per file",
            state.config.max_file_size / 1024 / 1024
        ))
    } else {
        AppError::BadInput(e.body_text())
    }
}

/// Body errors of a file field are client errors; staging turns
/// `InvalidData` into `BadInput`.
fn field_error(e: MultipartError) -> io::Error {
    let message = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        "Request body exceeds the maximum allowed size".to_string()
    } else {
        e.body_text()
    };
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Consumes what is left of the form so the client sees the error response
/// instead of a reset connection.
async fn drain(multipart: &mut Multipart, cause: &AppError) {
    tracing::warn!("Upload failed early: {}. Consuming remaining stream...", cause);
    while let Ok(Some(mut field)) = multipart.next_field().await {
        while let Ok(Some(_)) = field.chunk().await {}
    }
}
