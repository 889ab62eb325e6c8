//! HTTP API for the CRM

pub mod auth_handlers;
pub mod copilot_handlers;
pub mod crm_handlers;
pub mod dashboard_handlers;
pub mod handlers;
pub mod query;
pub mod routes;

pub use query::*;
pub use routes::create_router;
