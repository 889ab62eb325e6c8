//! Authentication module: allowlisted email/password login with JWT sessions
//!
//! Provides:
//! - JWT token encoding/decoding (`jwt`)
//! - Session cookie helpers (`session`)
//! - Bcrypt hashing and allowlist provisioning (`password`)
//! - `require_auth` middleware and the `AuthUser` extractor

pub mod extractor;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;

pub use extractor::AuthUser;
pub use middleware::require_auth;
pub use password::{provision_allowlist, ProvisionReport};
