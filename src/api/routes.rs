//! API route definitions

use super::auth_handlers;
use super::copilot_handlers;
use super::crm_handlers;
use super::dashboard_handlers;
use super::handlers::{self, CrmState};
use crate::auth::require_auth;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// CORS policy. With configured origins, credentials (the session cookie)
/// are allowed for exactly those origins; otherwise any origin, no credentials.
fn cors_layer(state: &CrmState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .cors_origins()
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}

/// Create the API router
pub fn create_router(state: CrmState) -> Router {
    let public = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/logout", post(auth_handlers::logout));

    let protected = Router::new()
        // ====================================================================
        // Auth & users
        // ====================================================================
        .route("/api/auth/me", get(auth_handlers::get_me))
        .route(
            "/api/auth/change-password",
            post(auth_handlers::change_password),
        )
        .route(
            "/api/auth/users",
            get(auth_handlers::list_users).post(auth_handlers::create_user),
        )
        .route(
            "/api/auth/users/{user_id}",
            put(auth_handlers::update_user).delete(auth_handlers::delete_user),
        )
        .route(
            "/api/auth/users/{user_id}/reset-password",
            post(auth_handlers::reset_password),
        )
        .route("/api/auth/setup-users", post(auth_handlers::setup_users))
        // ====================================================================
        // Organizations
        // ====================================================================
        .route(
            "/api/organizations",
            get(crm_handlers::list_organizations).post(crm_handlers::create_organization),
        )
        .route(
            "/api/organizations/{org_id}",
            get(crm_handlers::get_organization)
                .put(crm_handlers::update_organization)
                .delete(crm_handlers::delete_organization),
        )
        .route(
            "/api/organizations/{org_id}/summary",
            get(crm_handlers::get_organization_summary),
        )
        .route(
            "/api/organizations/{org_id}/notes",
            post(crm_handlers::add_organization_note),
        )
        // Contacts
        .route(
            "/api/contacts",
            get(crm_handlers::list_contacts).post(crm_handlers::create_contact),
        )
        .route(
            "/api/contacts/{contact_id}",
            get(crm_handlers::get_contact)
                .put(crm_handlers::update_contact)
                .delete(crm_handlers::delete_contact),
        )
        // Opportunities
        .route(
            "/api/opportunities",
            get(crm_handlers::list_opportunities).post(crm_handlers::create_opportunity),
        )
        .route(
            "/api/opportunities/{opp_id}",
            get(crm_handlers::get_opportunity)
                .put(crm_handlers::update_opportunity)
                .delete(crm_handlers::delete_opportunity),
        )
        .route(
            "/api/opportunities/{opp_id}/at-risk",
            put(crm_handlers::set_opportunity_at_risk),
        )
        // Activities
        .route(
            "/api/activities",
            get(crm_handlers::list_activities).post(crm_handlers::create_activity),
        )
        .route(
            "/api/activities/{activity_id}",
            get(crm_handlers::get_activity)
                .put(crm_handlers::update_activity)
                .delete(crm_handlers::delete_activity),
        )
        // ====================================================================
        // Pipelines & stages
        // ====================================================================
        .route(
            "/api/pipelines",
            get(handlers::list_pipelines).post(handlers::create_pipeline),
        )
        .route("/api/pipelines/{pipeline_id}", put(handlers::update_pipeline))
        .route(
            "/api/pipelines/{pipeline_id}/stages",
            get(handlers::list_pipeline_stages).post(handlers::create_stage),
        )
        // ====================================================================
        // Dashboards, analytics, reports
        // ====================================================================
        .route(
            "/api/dashboard/sales",
            get(dashboard_handlers::sales_dashboard),
        )
        .route(
            "/api/dashboard/my-pipeline",
            get(dashboard_handlers::my_pipeline_dashboard),
        )
        .route(
            "/api/dashboard/executive",
            get(dashboard_handlers::executive_dashboard),
        )
        .route(
            "/api/analytics/pipeline",
            get(dashboard_handlers::pipeline_analytics),
        )
        .route(
            "/api/analytics/engagement-types",
            get(dashboard_handlers::engagement_type_analytics),
        )
        .route(
            "/api/analytics/by-owner",
            get(dashboard_handlers::owner_analytics),
        )
        .route(
            "/api/analytics/summary",
            get(dashboard_handlers::summary_analytics),
        )
        .route(
            "/api/reports/summary",
            get(dashboard_handlers::reports_summary),
        )
        // ====================================================================
        // Copilot & seed
        // ====================================================================
        .route("/api/ai/copilot", post(copilot_handlers::copilot))
        .route("/api/seed", post(handlers::seed))
        .layer(from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state))
        .with_state(state)
}
