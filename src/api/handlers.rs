//! Shared server state, error mapping, and the health/pipeline/seed handlers

use crate::auth::AuthUser;
use crate::copilot::{CopilotError, CopilotService};
use crate::crm::seed::{seed_demo_data, SeedOutcome};
use crate::crm::{
    CreatePipelineRequest, CreateStageRequest, CrmError, CrmManager, UpdatePipelineRequest,
};
use crate::neo4j::models::{PipelineNode, StageNode};
use crate::neo4j::CrmStore;
use crate::AuthConfig;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub store: Arc<dyn CrmStore>,
    pub crm: CrmManager,
    pub copilot: CopilotService,
    /// Auth config. None means deny-by-default
    pub auth_config: Option<AuthConfig>,
    /// Public URL behind a reverse proxy (e.g. https://crm.example.com).
    /// Drives the cookie `Secure` flag and CORS.
    pub public_url: Option<String>,
    pub server_port: u16,
    /// Extra CORS origins from config
    pub allowed_origins: Vec<String>,
    /// Bcrypt cost for password writes made through the API
    pub password_cost: u32,
}

/// Shared CRM state
pub type CrmState = Arc<ServerState>;

impl ServerState {
    /// Origins allowed to send credentialed requests. Empty means any origin
    /// (without credentials).
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        let candidates = self
            .public_url
            .iter()
            .chain(self.allowed_origins.iter());
        for url in candidates {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            if !trimmed.is_empty() && !origins.contains(&trimmed) {
                origins.push(trimmed);
            }
        }
        origins
    }

    /// Whether cookies should be marked `Secure`
    pub fn secure_cookies(&self) -> bool {
        crate::auth::session::should_set_secure(self.public_url.as_deref())
    }
}

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Health check handler: verifies actual connectivity to Neo4j.
///
/// Returns 200 `healthy/connected`, or 503 `unhealthy/disconnected`.
pub async fn health(State(state): State<CrmState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = state.store.health_check().await.unwrap_or_else(|e| {
        tracing::warn!("Health check failed: {:#}", e);
        false
    });

    if db_ok {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "connected",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "disconnected",
            }),
        )
    }
}

// ============================================================================
// Pipelines & stages
// ============================================================================

pub async fn list_pipelines(
    State(state): State<CrmState>,
) -> Result<Json<Vec<PipelineNode>>, AppError> {
    Ok(Json(state.store.list_pipelines().await?))
}

/// Stages of a pipeline, ordered
pub async fn list_pipeline_stages(
    State(state): State<CrmState>,
    Path(pipeline_id): Path<String>,
) -> Result<Json<Vec<StageNode>>, AppError> {
    let stages = state
        .crm
        .list_stages(&pipeline_id)
        .await?
        .ok_or(AppError::NotFound("Pipeline not found".into()))?;
    Ok(Json(stages))
}

pub async fn create_pipeline(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<CreatePipelineRequest>,
) -> Result<Json<PipelineNode>, AppError> {
    user.require_admin()?;
    Ok(Json(state.crm.create_pipeline(req).await?))
}

pub async fn update_pipeline(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(pipeline_id): Path<String>,
    Json(req): Json<UpdatePipelineRequest>,
) -> Result<Json<PipelineNode>, AppError> {
    user.require_admin()?;
    let pipeline = state
        .crm
        .update_pipeline(&pipeline_id, req)
        .await?
        .ok_or(AppError::NotFound("Pipeline not found".into()))?;
    Ok(Json(pipeline))
}

pub async fn create_stage(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(pipeline_id): Path<String>,
    Json(req): Json<CreateStageRequest>,
) -> Result<Json<StageNode>, AppError> {
    user.require_admin()?;
    Ok(Json(state.crm.create_stage(&pipeline_id, req).await?))
}

// ============================================================================
// Seed
// ============================================================================

/// Load the demo data set once. The caller owns the seeded records.
pub async fn seed(
    State(state): State<CrmState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let outcome = seed_demo_data(state.store.as_ref(), &user.user_id).await?;
    let body = match outcome {
        SeedOutcome::Seeded {
            organizations,
            opportunities,
            activities,
        } => json!({
            "message": "Data seeded successfully",
            "organizations": organizations,
            "opportunities": opportunities,
            "activities": activities,
        }),
        SeedOutcome::AlreadySeeded => json!({ "message": "Data already seeded" }),
    };
    Ok(Json(body))
}

/// Body returned by every successful delete
pub fn deleted() -> Json<Value> {
    Json(json!({ "message": "Deleted" }))
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    /// A dependency outside the store (the copilot LLM) failed
    Upstream(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<CrmError> for AppError {
    fn from(err: CrmError) -> Self {
        let message = err.to_string();
        match err {
            CrmError::NotFound(_) => AppError::NotFound(message),
            CrmError::Validation(_) => AppError::BadRequest(message),
            CrmError::Conflict(_) => AppError::Conflict(message),
            CrmError::Forbidden(_) => AppError::Forbidden(message),
        }
    }
}

impl From<CopilotError> for AppError {
    fn from(err: CopilotError) -> Self {
        match err {
            CopilotError::UnknownAction(_) => AppError::BadRequest(err.to_string()),
            CopilotError::Unavailable => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<CrmError>() {
            Ok(crm) => return crm.into(),
            Err(err) => err,
        };
        match err.downcast::<CopilotError>() {
            Ok(copilot) => copilot.into(),
            Err(err) => AppError::Internal(err),
        }
    }
}
