//! Authentication and user-management route handlers.
//!
//! Endpoints:
//! - `POST /api/auth/login`                      Email/password login, sets the session cookie
//! - `POST /api/auth/logout`                     Clears the session cookie
//! - `GET  /api/auth/me`                         The authenticated user
//! - `POST /api/auth/change-password`            Change own password
//! - `GET  /api/auth/users`                      List users
//! - `POST /api/auth/users`                      Create a user (admin)
//! - `PUT  /api/auth/users/{id}`                 Update a user (admin)
//! - `DELETE /api/auth/users/{id}`               Delete a user (admin)
//! - `POST /api/auth/users/{id}/reset-password`  Set a user's password (admin)
//! - `POST /api/auth/setup-users`                Provision the allowlist (admin)

use super::handlers::{deleted, AppError, CrmState};
use crate::auth::jwt::encode_jwt;
use crate::auth::password::{hash_password, is_valid_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::session::{build_clear_cookie, build_session_cookie};
use crate::auth::{provision_allowlist, AuthUser, ProvisionReport};
use crate::neo4j::models::{UserNode, UserRole};
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Request / Response types
// ============================================================================

/// Request body for POST /auth/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    pub password: String,
}

fn default_role() -> String {
    UserRole::SalesLead.as_str().to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// User info returned to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserNode> for UserResponse {
    fn from(u: UserNode) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            name: u.name,
            role: u.role,
            picture: u.picture,
            created_at: u.created_at,
        }
    }
}

fn parse_role(raw: &str) -> Result<UserRole, AppError> {
    raw.parse::<UserRole>().map_err(AppError::BadRequest)
}

fn require_valid_password(password: &str) -> Result<(), AppError> {
    if is_valid_password(password) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )))
    }
}

/// Accounts can only be created for, or moved to, allowlisted emails.
fn require_allowlisted(state: &CrmState, email: &str) -> Result<(), AppError> {
    let allowed = state
        .auth_config
        .as_ref()
        .is_some_and(|config| config.is_authorized(email));
    if allowed {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Email is not on the authorized user list".to_string(),
        ))
    }
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::BadRequest("Invalid email address".to_string())),
    }
}

// ============================================================================
// Session
// ============================================================================

/// POST /auth/login: email/password authentication.
///
/// Flow:
/// 1. Normalize the email (trim + lowercase)
/// 2. Reject emails that are not on the allowlist before any store lookup
/// 3. Verify the bcrypt hash
/// 4. Issue a JWT in an `HttpOnly` session cookie and return the user
pub async fn login(
    State(state): State<CrmState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth_config = state
        .auth_config
        .as_ref()
        .ok_or_else(|| AppError::Forbidden("Authentication not configured".to_string()))?;

    let invalid_credentials = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = req.email.trim().to_lowercase();
    if !auth_config.is_authorized(&email) {
        return Err(AppError::Unauthorized("Unauthorized user".to_string()));
    }
    let user = state
        .store
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&req.password, password_hash) {
        return Err(invalid_credentials());
    }

    let token = encode_jwt(&user, &auth_config.jwt_secret, auth_config.jwt_expiry_secs)
        .map_err(AppError::Internal)?;
    let cookie = build_session_cookie(&token, auth_config.jwt_expiry_secs, state.secure_cookies())
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.user_id, "User logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    ))
}

/// POST /auth/logout: clears the session cookie. Always succeeds.
pub async fn logout(State(state): State<CrmState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, build_clear_cookie(state.secure_cookies()))],
        Json(json!({ "message": "Logged out" })),
    )
}

/// GET /auth/me
pub async fn get_me(
    State(state): State<CrmState>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let node = state
        .store
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
    Ok(Json(UserResponse::from(node)))
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    require_valid_password(&req.new_password)?;

    let mut node = state
        .store
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    let current_ok = node
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&req.current_password, hash));
    if !current_ok {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    node.password_hash = Some(hash_password(&req.new_password, state.password_cost)?);
    state.store.update_user(&node).await?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

// ============================================================================
// User management
// ============================================================================

/// GET /auth/users
pub async fn list_users(
    State(state): State<CrmState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /auth/users (admin)
pub async fn create_user(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    user.require_admin()?;

    let email = normalize_email(&req.email)?;
    require_allowlisted(&state, &email)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    let role = parse_role(&req.role)?;
    require_valid_password(&req.password)?;

    if state.store.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest(
            "A user with this email already exists".to_string(),
        ));
    }

    let hash = hash_password(&req.password, state.password_cost)?;
    let node = UserNode::new(&email, name.to_string(), role, Some(hash));
    state.store.create_user(&node).await?;

    tracing::info!(user_id = %node.user_id, created_by = %user.user_id, "User created");
    Ok(Json(UserResponse::from(node)))
}

/// PUT /auth/users/{id} (admin)
pub async fn update_user(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    user.require_admin()?;

    let mut node = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))?;

    if let Some(ref name) = req.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        node.name = name.to_string();
    }
    if let Some(ref raw) = req.email {
        let email = normalize_email(raw)?;
        if email != node.email {
            require_allowlisted(&state, &email)?;
            let taken = state.store.get_user_by_email(&email).await?;
            if taken.is_some_and(|other| other.user_id != node.user_id) {
                return Err(AppError::BadRequest(
                    "A user with this email already exists".to_string(),
                ));
            }
            node.email = email;
        }
    }
    if let Some(ref raw) = req.role {
        node.role = parse_role(raw)?;
    }

    state.store.update_user(&node).await?;
    Ok(Json(UserResponse::from(node)))
}

/// DELETE /auth/users/{id} (admin). Admins cannot delete themselves.
pub async fn delete_user(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    user.require_admin()?;
    if user_id == user.user_id {
        return Err(AppError::Forbidden(
            "Cannot delete your own account".to_string(),
        ));
    }

    if !state.store.delete_user(&user_id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    tracing::info!(user_id = %user_id, deleted_by = %user.user_id, "User deleted");
    Ok(deleted())
}

/// POST /auth/users/{id}/reset-password (admin)
pub async fn reset_password(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_admin()?;
    require_valid_password(&req.new_password)?;

    let mut node = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))?;
    node.password_hash = Some(hash_password(&req.new_password, state.password_cost)?);
    state.store.update_user(&node).await?;

    Ok(Json(json!({ "message": "Password reset successfully" })))
}

/// POST /auth/setup-users (admin): create missing allowlisted accounts
pub async fn setup_users(
    State(state): State<CrmState>,
    user: AuthUser,
) -> Result<Json<ProvisionReport>, AppError> {
    user.require_admin()?;
    let auth_config = state
        .auth_config
        .as_ref()
        .ok_or_else(|| AppError::Forbidden("Authentication not configured".to_string()))?;

    let report = provision_allowlist(
        state.store.as_ref(),
        &auth_config.authorized_users,
        &auth_config.default_password,
        state.password_cost,
    )
    .await?;
    Ok(Json(report))
}

// ============================================================================
// Tests
// ============================================================================
