//! Password hashing and allowlist provisioning

use crate::neo4j::models::{UserNode, UserRole};
use crate::neo4j::CrmStore;
use crate::AuthorizedUser;
use anyhow::{Context, Result};

/// Bcrypt cost for stored password hashes
pub const BCRYPT_COST: u32 = 12;

/// Shortest password accepted on create, change and reset
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// Constant-time check of `password` against a stored hash. A malformed
/// hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Outcome of [`provision_allowlist`]: emails created and emails already present.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Create a user for every allowlisted email that has no account yet.
/// New accounts get `default_password`; existing accounts are left untouched.
pub async fn provision_allowlist(
    store: &dyn CrmStore,
    allowlist: &[AuthorizedUser],
    default_password: &str,
    cost: u32,
) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();

    for entry in allowlist {
        let email = entry.email.trim().to_lowercase();
        if email.is_empty() {
            continue;
        }
        if store.get_user_by_email(&email).await?.is_some() {
            report.existing.push(email);
            continue;
        }

        let role = entry.role.parse::<UserRole>().unwrap_or_else(|e| {
            tracing::warn!(email = %email, "{}; provisioning as sales_lead", e);
            UserRole::SalesLead
        });
        let hash = hash_password(default_password, cost)?;
        let user = UserNode::new(&email, entry.name.clone(), role, Some(hash));
        store
            .create_user(&user)
            .await
            .with_context(|| format!("Failed to provision user {}", email))?;
        tracing::info!(email = %email, role = role.as_str(), "Provisioned allowlisted user");
        report.created.push(email);
    }

    Ok(report)
}
