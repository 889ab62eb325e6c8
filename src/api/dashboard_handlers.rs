//! Read-only views: dashboards, analytics and reports.
//!
//! Every view loads the relevant entities, narrows them to a [`Scope`] and
//! hands them to the rollup engine. Nothing here writes.

use super::auth_handlers::UserResponse;
use super::handlers::{AppError, CrmState};
use super::query::OwnerScopeQuery;
use crate::auth::AuthUser;
use crate::neo4j::models::{
    ActivityFilter, ActivityNode, OpportunityFilter, OpportunityNode, StageNode, UserNode,
};
use crate::pipeline::rollup::{
    self, count_value_map, dashboard_metrics, executive_metrics, pipeline_by_stage,
    report_summary, summarize, CountValue, DashboardMetrics, EngagementRow, ExecutiveMetrics,
    OwnerRow, PipelineSummary, ReportSummary, StageRow,
};
use crate::pipeline::{apply_scope, Scope};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Opportunities and activities narrowed to `scope`
async fn load_scoped(
    state: &CrmState,
    scope: &Scope,
) -> Result<(Vec<OpportunityNode>, Vec<ActivityNode>), AppError> {
    let opp_filter = OpportunityFilter::default();
    let activity_filter = ActivityFilter::default();
    let (opps, activities) = futures::try_join!(
        state.store.list_opportunities(&opp_filter),
        state.store.list_activities(&activity_filter),
    )?;
    Ok(apply_scope(scope, opps, activities))
}

fn owner_names(users: &[UserNode]) -> HashMap<String, String> {
    users
        .iter()
        .map(|u| (u.user_id.clone(), u.name.clone()))
        .collect()
}

fn user_responses(users: Vec<UserNode>) -> Vec<UserResponse> {
    users.into_iter().map(UserResponse::from).collect()
}

// ============================================================================
// Dashboards
// ============================================================================

#[derive(Serialize)]
pub struct SalesDashboard {
    pub opportunities: Vec<OpportunityNode>,
    /// Stages of the default pipeline, ordered
    pub stages: Vec<StageNode>,
    pub activities: Vec<ActivityNode>,
    pub users: Vec<UserResponse>,
    pub current_user_id: String,
    pub metrics: DashboardMetrics,
}

#[derive(Serialize)]
pub struct ExecutiveDashboard {
    pub opportunities: Vec<OpportunityNode>,
    pub stages: Vec<StageNode>,
    pub users: Vec<UserResponse>,
    pub metrics: ExecutiveMetrics,
    pub by_stage: BTreeMap<String, CountValue>,
    pub by_owner: BTreeMap<String, CountValue>,
}

async fn sales_view(
    state: &CrmState,
    user: &AuthUser,
    scope: Scope,
) -> Result<SalesDashboard, AppError> {
    let ((opportunities, activities), stages, users) = futures::try_join!(
        load_scoped(state, &scope),
        async { state.crm.default_stages().await.map_err(AppError::from) },
        async { state.store.list_users().await.map_err(AppError::from) },
    )?;
    let metrics = dashboard_metrics(&opportunities, &activities, Utc::now());

    Ok(SalesDashboard {
        opportunities,
        stages,
        activities,
        users: user_responses(users),
        current_user_id: user.user_id.clone(),
        metrics,
    })
}

/// Whole-portfolio sales dashboard
pub async fn sales_dashboard(
    State(state): State<CrmState>,
    user: AuthUser,
) -> Result<Json<SalesDashboard>, AppError> {
    Ok(Json(sales_view(&state, &user, Scope::All).await?))
}

/// Sales dashboard restricted to the caller's deals and activities
pub async fn my_pipeline_dashboard(
    State(state): State<CrmState>,
    user: AuthUser,
) -> Result<Json<SalesDashboard>, AppError> {
    let scope = Scope::Mine(user.user_id.clone());
    Ok(Json(sales_view(&state, &user, scope).await?))
}

pub async fn executive_dashboard(
    State(state): State<CrmState>,
) -> Result<Json<ExecutiveDashboard>, AppError> {
    let scope = Scope::All;
    let ((opportunities, _), stages, users) = futures::try_join!(
        load_scoped(&state, &scope),
        async { state.crm.default_stages().await.map_err(AppError::from) },
        async { state.store.list_users().await.map_err(AppError::from) },
    )?;

    let by_owner: Vec<rollup::Bucket> = rollup::by_owner(&opportunities, &owner_names(&users))
        .into_iter()
        .map(|r| r.bucket)
        .collect();

    Ok(Json(ExecutiveDashboard {
        metrics: executive_metrics(&opportunities),
        by_stage: count_value_map(&rollup::by_stage(&opportunities)),
        by_owner: count_value_map(&by_owner),
        opportunities,
        stages,
        users: user_responses(users),
    }))
}

// ============================================================================
// Analytics
// ============================================================================

/// Default-pipeline stages in order, then unmatched stage buckets
pub async fn pipeline_analytics(
    State(state): State<CrmState>,
    Query(query): Query<OwnerScopeQuery>,
) -> Result<Json<Vec<StageRow>>, AppError> {
    let (opps, _) = load_scoped(&state, &query.scope()).await?;
    let stages = state.crm.default_stages().await?;
    Ok(Json(pipeline_by_stage(&stages, &opps)))
}

pub async fn engagement_type_analytics(
    State(state): State<CrmState>,
    Query(query): Query<OwnerScopeQuery>,
) -> Result<Json<Vec<EngagementRow>>, AppError> {
    let (opps, _) = load_scoped(&state, &query.scope()).await?;
    let rows = rollup::by_engagement_type(&opps)
        .into_iter()
        .map(EngagementRow::from)
        .collect();
    Ok(Json(rows))
}

/// Owner rollups, highest total value first
pub async fn owner_analytics(
    State(state): State<CrmState>,
    Query(query): Query<OwnerScopeQuery>,
) -> Result<Json<Vec<OwnerRow>>, AppError> {
    let scope = query.scope();
    let ((opps, _), users) = futures::try_join!(
        load_scoped(&state, &scope),
        async { state.store.list_users().await.map_err(AppError::from) },
    )?;
    let rows = rollup::by_owner(&opps, &owner_names(&users))
        .into_iter()
        .map(OwnerRow::from)
        .collect();
    Ok(Json(rows))
}

pub async fn summary_analytics(
    State(state): State<CrmState>,
    Query(query): Query<OwnerScopeQuery>,
) -> Result<Json<PipelineSummary>, AppError> {
    let (opps, activities) = load_scoped(&state, &query.scope()).await?;
    Ok(Json(summarize(&opps, &activities, Utc::now())))
}

// ============================================================================
// Reports
// ============================================================================

/// Won / lost / active / pipeline / total as `{count, value}`
pub async fn reports_summary(
    State(state): State<CrmState>,
) -> Result<Json<ReportSummary>, AppError> {
    let opps = state
        .store
        .list_opportunities(&OpportunityFilter::default())
        .await?;
    Ok(Json(report_summary(&opps)))
}

#[cfg(test)]
mod tests {
    use crate::neo4j::models::{EngagementType, UserNode, UserRole};
    use crate::test_helpers::{
        body_json, json_request, seeded_mock_store, test_activity, test_app, test_bearer_token,
        test_opportunity, test_user,
    };
    use axum::http::StatusCode;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    /// Lead: an at-risk discovery deal (100k @ 50%) with an overdue call, and a
    /// won Advisory deal (50k). Admin: a lost deal (20k @ 10%) and a loose task.
    async fn portfolio() -> (Router, UserNode, UserNode) {
        let lead = test_user("lead@example.com", UserRole::SalesLead);
        let admin = test_user("admin@example.com", UserRole::Admin);

        let mut at_risk = test_opportunity(
            "opp_1",
            "org_seed",
            &lead.user_id,
            "stage_discovery",
            100_000.0,
            50,
        );
        at_risk.is_at_risk = true;
        let mut won = test_opportunity(
            "opp_2",
            "org_seed",
            &lead.user_id,
            "stage_closed_won",
            50_000.0,
            100,
        );
        won.engagement_type = Some(EngagementType::Advisory);
        let lost = test_opportunity(
            "opp_3",
            "org_seed",
            &admin.user_id,
            "stage_closed_lost",
            20_000.0,
            10,
        );

        let mut overdue = test_activity(Some("opp_1"), None, &lead.user_id);
        overdue.due_date = Some("2020-01-01".into());
        let loose_task = test_activity(None, None, &admin.user_id);

        let store = seeded_mock_store()
            .await
            .with_user(lead.clone())
            .await
            .with_user(admin.clone())
            .await
            .with_opportunity(at_risk)
            .await
            .with_opportunity(won)
            .await
            .with_opportunity(lost)
            .await
            .with_activity(overdue)
            .await
            .with_activity(loose_task)
            .await;
        (test_app(store), lead, admin)
    }

    async fn get(app: &Router, uri: &str, user: &UserNode) -> Value {
        let resp = app
            .clone()
            .oneshot(json_request("GET", uri, Some(&test_bearer_token(user)), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "GET {}", uri);
        body_json(resp).await
    }

    fn f(value: &Value) -> f64 {
        value.as_f64().unwrap()
    }

    #[tokio::test]
    async fn test_sales_dashboard_whole_portfolio() {
        let (app, lead, _) = portfolio().await;
        let body = get(&app, "/api/dashboard/sales", &lead).await;

        assert_eq!(body["current_user_id"], lead.user_id.as_str());
        assert_eq!(body["opportunities"].as_array().unwrap().len(), 3);
        assert_eq!(body["activities"].as_array().unwrap().len(), 2);
        assert_eq!(body["stages"].as_array().unwrap().len(), 8);
        assert_eq!(body["stages"][0]["stage_id"], "stage_discovery");
        assert_eq!(body["users"].as_array().unwrap().len(), 2);
        assert!(body["users"][0].get("password_hash").is_none());

        let m = &body["metrics"];
        assert_eq!(m["total_opportunities"], 3);
        assert_eq!(f(&m["total_value"]), 170_000.0);
        assert_eq!(f(&m["weighted_forecast"]), 102_000.0);
        assert_eq!(m["overdue_activities"], 1);
        assert_eq!(m["at_risk_opportunities"], 1);
    }

    #[tokio::test]
    async fn test_my_pipeline_is_scoped_to_caller() {
        let (app, lead, admin) = portfolio().await;

        let body = get(&app, "/api/dashboard/my-pipeline", &lead).await;
        assert_eq!(body["opportunities"].as_array().unwrap().len(), 2);
        assert_eq!(body["activities"].as_array().unwrap().len(), 1);
        assert_eq!(f(&body["metrics"]["total_value"]), 150_000.0);
        assert_eq!(body["metrics"]["overdue_activities"], 1);

        let body = get(&app, "/api/dashboard/my-pipeline", &admin).await;
        assert_eq!(body["opportunities"].as_array().unwrap().len(), 1);
        // The admin's task has no opportunity but is theirs
        assert_eq!(body["activities"].as_array().unwrap().len(), 1);
        assert_eq!(body["metrics"]["overdue_activities"], 0);
    }

    #[tokio::test]
    async fn test_executive_dashboard() {
        let (app, lead, admin) = portfolio().await;
        let body = get(&app, "/api/dashboard/executive", &admin).await;

        let m = &body["metrics"];
        assert_eq!(f(&m["total_pipeline_value"]), 170_000.0);
        assert_eq!(m["total_deals"], 3);
        assert_eq!(m["won_deals"], 1);
        assert_eq!(m["lost_deals"], 1);
        assert_eq!(f(&m["win_rate"]), 50.0);

        assert_eq!(body["by_stage"]["stage_closed_won"]["count"], 1);
        assert_eq!(f(&body["by_stage"]["stage_discovery"]["value"]), 100_000.0);
        assert_eq!(body["by_owner"][lead.user_id.as_str()]["count"], 2);
        assert_eq!(f(&body["by_owner"][admin.user_id.as_str()]["value"]), 20_000.0);
    }

    #[tokio::test]
    async fn test_summary_analytics_with_owner_scope() {
        let (app, lead, _) = portfolio().await;

        let all = get(&app, "/api/analytics/summary", &lead).await;
        assert_eq!(all["total_deals"], 3);
        assert_eq!(all["active_deals"], 1);
        assert_eq!(f(&all["win_rate"]), 50.0);

        let mine = get(
            &app,
            &format!("/api/analytics/summary?owner_id={}", lead.user_id),
            &lead,
        )
        .await;
        assert_eq!(mine["total_deals"], 2);
        assert_eq!(mine["won_deals"], 1);
        assert_eq!(mine["lost_deals"], 0);
        assert_eq!(f(&mine["win_rate"]), 100.0);
        assert_eq!(f(&mine["average_deal_size"]), 75_000.0);
        assert_eq!(mine["at_risk_deals"], 1);
        assert_eq!(mine["overdue_activities"], 1);

        // Empty owner_id means the whole portfolio
        let blank = get(&app, "/api/analytics/summary?owner_id=", &lead).await;
        assert_eq!(blank["total_deals"], 3);
    }

    #[tokio::test]
    async fn test_pipeline_and_owner_analytics() {
        let (app, lead, _) = portfolio().await;

        let rows = get(&app, "/api/analytics/pipeline", &lead).await;
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0]["stage"], "Discovery");
        assert_eq!(rows[0]["count"], 1);
        assert_eq!(f(&rows[0]["weighted"]), 50_000.0);
        assert_eq!(rows[1]["count"], 0);

        let owners = get(&app, "/api/analytics/by-owner", &lead).await;
        let owners = owners.as_array().unwrap();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0]["owner_id"], lead.user_id.as_str());
        assert_eq!(owners[0]["owner_name"], lead.name.as_str());
        assert_eq!(f(&owners[0]["value"]), 150_000.0);
        assert_eq!(f(&owners[1]["win_rate"]), 0.0);

        let types = get(&app, "/api/analytics/engagement-types", &lead).await;
        let types = types.as_array().unwrap();
        let advisory = types.iter().find(|r| r["type"] == "Advisory").unwrap();
        assert_eq!(advisory["won"], 1);
        let unknown = types.iter().find(|r| r["type"] == "Unknown").unwrap();
        assert_eq!(unknown["total"], 2);
    }

    #[tokio::test]
    async fn test_reports_summary() {
        let (app, lead, _) = portfolio().await;
        let body = get(&app, "/api/reports/summary", &lead).await;

        assert_eq!(body["won"]["count"], 1);
        assert_eq!(f(&body["won"]["value"]), 50_000.0);
        assert_eq!(body["active"], body["won"]);
        assert_eq!(body["lost"]["count"], 1);
        assert_eq!(f(&body["pipeline"]["value"]), 100_000.0);
        assert_eq!(body["total"]["count"], 3);
        assert_eq!(f(&body["total"]["value"]), 170_000.0);
    }
}
