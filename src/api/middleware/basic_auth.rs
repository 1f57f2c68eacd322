use crate::AppState;
use crate::api::error::AppError;
use crate::config::StatusCredentials;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// HTTP Basic auth against the configured status credentials. Without
/// configured credentials every request is rejected.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.status_credentials.as_ref() else {
        tracing::debug!("Status credentials not configured, rejecting request");
        return Err(AppError::Unauthorized);
    };

    if !is_authorized(req.headers(), expected) {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(req).await)
}

pub fn is_authorized(headers: &HeaderMap, expected: &StatusCredentials) -> bool {
    let Some((username, password)) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic)
    else {
        return false;
    };

    username == expected.username && password == expected.password
}

fn parse_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
