use crate::AppState;
use crate::api::error::AppError;
use crate::utils::version::ApiVersion;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

/// Rejects requests whose `/v{version}` segment is unparseable or outside the
/// configured range.
pub async fn api_version_middleware(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check_version(
        &segment,
        state.config.min_api_version,
        state.config.max_api_version,
    )?;

    Ok(next.run(req).await)
}

pub fn check_version(
    segment: &str,
    min: ApiVersion,
    max: ApiVersion,
) -> Result<ApiVersion, AppError> {
    let raw = segment
        .strip_prefix('v')
        .ok_or_else(|| AppError::BadInput(format!("Invalid version: '{}' must start with 'v'", segment)))?;

    let version: ApiVersion = raw
        .parse()
        .map_err(|e| AppError::BadInput(format!("Invalid version: {}", e)))?;

    if version < min {
        return Err(AppError::BadInput(format!(
            "Min supported version is {}",
            min
        )));
    }

    if version > max {
        return Err(AppError::BadInput(format!(
            "Max supported version is {}",
            max
        )));
    }

    Ok(version)
}
