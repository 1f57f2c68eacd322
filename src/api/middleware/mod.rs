pub mod api_version;
pub mod basic_auth;
pub mod metrics;
pub mod request_id;
