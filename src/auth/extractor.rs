//! AuthUser extractor for Axum handlers.
//!
//! Extracts the authenticated user's identity from request extensions
//! (populated by the `require_auth` middleware).

use crate::api::handlers::{AppError, CrmState};
use crate::auth::jwt::Claims;
use crate::neo4j::models::UserRole;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Authenticated user identity.
///
/// ```rust,ignore
/// async fn my_handler(user: AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl AuthUser {
    fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 403 unless the caller is an admin
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

impl FromRequestParts<CrmState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &CrmState,
    ) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<Claims>().ok_or_else(|| {
            AppError::Unauthorized("Authentication required, no claims in request".to_string())
        })?;

        Ok(Self::from_claims(claims))
    }
}
