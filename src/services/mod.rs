pub mod publisher;
pub mod sniffer;
pub mod staging;
pub mod storage;
pub mod upload_service;
