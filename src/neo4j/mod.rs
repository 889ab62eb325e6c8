//! Neo4j client and models for the CRM entity store

pub mod client;
mod impl_crm_store;
pub mod models;
pub mod traits;

pub use client::Neo4jClient;
pub use models::*;
pub use traits::CrmStore;

#[cfg(test)]
pub(crate) mod mock;
