//! Auth middleware for Axum routes.
//!
//! Validates the session JWT (cookie or Bearer header) and injects Claims into
//! request extensions. Deny-by-default: if `auth_config` is None, all requests
//! are rejected.

use crate::api::handlers::{AppError, CrmState};
use crate::auth::jwt::decode_jwt;
use crate::auth::session::extract_credential;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Middleware that requires a valid session.
///
/// # Behavior
/// 1. If `auth_config` is `None` → 403 Forbidden (deny-by-default)
/// 2. Read the `session_token` cookie, else `Authorization: Bearer` → 401 if missing
/// 3. Validate the JWT with the configured secret → 401 if invalid/expired
/// 4. Re-read the user from the store → 401 if the account was deleted;
///    role and name come from the store so demotions apply immediately
/// 5. Re-check the stored email against the allowlist → 401 if it was removed
/// 6. Inject `Claims` into request extensions for downstream handlers
pub async fn require_auth(
    State(state): State<CrmState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_config = state.auth_config.as_ref().ok_or_else(|| {
        AppError::Forbidden("Authentication not configured, access denied".to_string())
    })?;

    let token = extract_credential(req.headers())
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let mut claims = decode_jwt(&token, &auth_config.jwt_secret)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let user = state
        .store
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
    if !auth_config.is_authorized(&user.email) {
        return Err(AppError::Unauthorized("Unauthorized user".to_string()));
    }
    claims.email = user.email;
    claims.name = user.name;
    claims.role = user.role;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
