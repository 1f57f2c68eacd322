pub mod status;
pub mod types;
pub mod video;
