pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::middleware::{
    api_version::api_version_middleware, basic_auth::basic_auth_middleware,
    metrics::RequestStats, metrics::metrics_middleware, request_id::request_id_middleware,
};
use crate::config::UploaderConfig;
use crate::services::publisher::Publisher;
use crate::services::sniffer::ContentSniffer;
use crate::services::staging::StagingWriter;
use crate::services::storage::ObjectStore;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Allowance on top of the file size limits for multipart boundaries and
/// part headers.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::video::upload_video,
        api::handlers::video::upload_video_batch,
        api::handlers::status::get_status,
    ),
    components(
        schemas(
            api::handlers::types::UploadResponse,
            api::handlers::types::ErrorResponse,
            api::middleware::metrics::StatusReport,
        )
    ),
    tags(
        (name = "video", description = "Media upload endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: UploaderConfig,
    pub upload_service: Arc<UploadService>,
    pub stats: Arc<RequestStats>,
}

impl AppState {
    /// Wires the upload pipeline on top of `store`.
    pub fn new(config: UploaderConfig, store: Arc<dyn ObjectStore>) -> Self {
        let staging = StagingWriter::new(
            config.scratch_dir.clone(),
            ContentSniffer::default(),
            config.max_file_size,
        );
        let publisher = Publisher::new(store, config.publish_timeout);
        let upload_service = UploadService::new(staging, publisher, config.bucket.clone());

        Self {
            config,
            upload_service: Arc::new(upload_service),
            stats: Arc::new(RequestStats::new()),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let video_routes = Router::new()
        .route(
            "/:version/video",
            post(api::handlers::video::upload_video).layer(DefaultBodyLimit::max(
                state.config.single_body_limit().saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route(
            "/:version/video/batch",
            post(api::handlers::video::upload_video_batch).layer(DefaultBodyLimit::max(
                state.config.batch_body_limit().saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route_layer(from_fn_with_state(state.clone(), api_version_middleware));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route(
            "/.status",
            get(api::handlers::status::get_status)
                .layer(from_fn_with_state(state.clone(), basic_auth_middleware)),
        )
        .merge(video_routes)
        .layer(from_fn_with_state(state.clone(), metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
