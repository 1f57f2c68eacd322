use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Success body of both upload routes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Published object name for single uploads, "All good" for batches.
    #[serde(rename = "Body")]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub const BATCH_SUCCESS_BODY: &str = "All good";
