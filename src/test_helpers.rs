//! Test helper factories and mock state builders
//!
//! Provides convenience functions for creating test entities with sensible
//! defaults, and helpers for building a mock `ServerState` and router.
#![allow(dead_code)]

use crate::api::handlers::{CrmState, ServerState};
use crate::copilot::CopilotService;
use crate::crm::seed::{default_pipeline, default_stages, DEFAULT_PIPELINE_ID};
use crate::crm::CrmManager;
use crate::neo4j::mock::MockCrmStore;
use crate::neo4j::models::*;
use crate::neo4j::CrmStore;
use crate::{AuthConfig, AuthorizedUser};
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use chrono::Utc;
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

/// Password of every user built by [`test_user`]
pub const TEST_PASSWORD: &str = "correct-horse-42";

/// Minimum bcrypt cost, for fast tests
pub const TEST_BCRYPT_COST: u32 = 4;

// ============================================================================
// Mock state builders
// ============================================================================

/// Auth config allowlisting `admin@example.com` (admin) and
/// `lead@example.com` (sales lead).
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry_secs: 3600,
        default_password: "Welcome-2026".to_string(),
        authorized_users: vec![
            AuthorizedUser {
                email: "admin@example.com".to_string(),
                name: "Ada Admin".to_string(),
                role: "admin".to_string(),
            },
            AuthorizedUser {
                email: "lead@example.com".to_string(),
                name: "Sam Lead".to_string(),
                role: "sales_lead".to_string(),
            },
        ],
    }
}

/// Server state over `store`, copilot disabled
pub fn server_state(store: MockCrmStore, auth_config: Option<AuthConfig>) -> ServerState {
    let store: Arc<dyn CrmStore> = Arc::new(store);
    ServerState {
        crm: CrmManager::new(store.clone()),
        store,
        copilot: CopilotService::disabled(),
        auth_config,
        public_url: None,
        server_port: 0,
        allowed_origins: Vec::new(),
        password_cost: TEST_BCRYPT_COST,
    }
}

pub fn mock_server_state(store: MockCrmStore, auth_config: Option<AuthConfig>) -> CrmState {
    Arc::new(server_state(store, auth_config))
}

/// Full router over `store` with [`test_auth_config`]
pub fn test_app(store: MockCrmStore) -> axum::Router {
    crate::api::create_router(mock_server_state(store, Some(test_auth_config())))
}

/// `Authorization` header value for `user`
pub fn test_bearer_token(user: &UserNode) -> String {
    let token = crate::auth::jwt::encode_jwt(user, TEST_SECRET, 3600).expect("encode test jwt");
    format!("Bearer {}", token)
}

/// Build a request with an optional `Authorization` header and JSON body
pub fn json_request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

pub async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Store holding the default pipeline, its stages and one organization (`org_seed`)
pub async fn seeded_mock_store() -> MockCrmStore {
    let mut store = MockCrmStore::default()
        .with_pipeline(default_pipeline())
        .await;
    for stage in default_stages() {
        store = store.with_stage(stage).await;
    }
    store
        .with_organization(test_organization("org_seed", "u1"))
        .await
}

// ============================================================================
// Entity factories
// ============================================================================

/// A user whose password is [`TEST_PASSWORD`]
pub fn test_user(email: &str, role: UserRole) -> UserNode {
    let hash = bcrypt::hash(TEST_PASSWORD, TEST_BCRYPT_COST).expect("hash test password");
    UserNode::new(email, email.split('@').next().unwrap_or(email).to_string(), role, Some(hash))
}

pub fn test_organization(id: &str, owner: &str) -> OrganizationNode {
    let now = Utc::now();
    OrganizationNode {
        org_id: id.to_string(),
        name: format!("Organization {}", id),
        industry: None,
        company_size: None,
        region: None,
        strategic_tier: StrategicTier::default(),
        primary_exec_sponsor: None,
        notes: None,
        notes_history: Vec::new(),
        google_drive_link: None,
        owner_id: owner.to_string(),
        created_by: owner.to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn test_contact(id: &str, org_id: &str) -> ContactNode {
    let now = Utc::now();
    ContactNode {
        contact_id: id.to_string(),
        name: format!("Contact {}", id),
        title: None,
        function: None,
        email: None,
        phone: None,
        buying_role: None,
        org_id: org_id.to_string(),
        notes: None,
        owner_id: "u1".to_string(),
        created_by: "u1".to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Opportunity in the default pipeline; the stage kind follows the stage id
pub fn test_opportunity(
    id: &str,
    org_id: &str,
    owner: &str,
    stage_id: &str,
    value: f64,
    confidence: i32,
) -> OpportunityNode {
    let now = Utc::now();
    OpportunityNode {
        opp_id: id.to_string(),
        name: format!("Opportunity {}", id),
        org_id: org_id.to_string(),
        primary_contact_id: None,
        engagement_type: None,
        estimated_value: value,
        confidence_level: confidence,
        owner_id: owner.to_string(),
        pipeline_id: DEFAULT_PIPELINE_ID.to_string(),
        stage_id: stage_id.to_string(),
        stage_kind: StageKind::from_stage_id(stage_id),
        target_close_date: None,
        source: None,
        notes: None,
        value_hypothesis: None,
        is_at_risk: false,
        at_risk_reason: None,
        deal_start_date: None,
        deal_end_date: None,
        num_consultants: None,
        blended_hourly_rate: None,
        calculated_value: None,
        created_at: now,
        updated_at: now,
        stage_entered_at: now,
        version: 0,
    }
}

/// Planned call with no due date
pub fn test_activity(opp_id: Option<&str>, org_id: Option<&str>, owner: &str) -> ActivityNode {
    let now = Utc::now();
    ActivityNode {
        activity_id: new_id("act"),
        activity_type: ActivityType::Call,
        title: None,
        opp_id: opp_id.map(String::from),
        org_id: org_id.map(String::from),
        due_date: None,
        owner_id: owner.to_string(),
        status: ActivityStatus::Planned,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_stage(id: &str, pipeline_id: &str, name: &str, order: i32) -> StageNode {
    StageNode {
        stage_id: id.to_string(),
        pipeline_id: pipeline_id.to_string(),
        name: name.to_string(),
        order,
        win_probability: 0,
        auto_activity: None,
        kind: StageKind::infer(id, name),
        created_at: Utc::now(),
    }
}
