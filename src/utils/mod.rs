pub mod validation;
pub mod version;
