//! CRM operations: request models, the write-path manager and demo seeding

pub mod manager;
pub mod models;
pub mod seed;

pub use manager::CrmManager;
pub use models::*;
