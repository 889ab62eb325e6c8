//! AI copilot endpoint

use super::handlers::{AppError, CrmState};
use crate::copilot::{CopilotAction, OpportunitySnapshot};
use crate::neo4j::models::ActivityFilter;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CopilotRequest {
    pub action: String,
    pub opp_id: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CopilotResponse {
    pub action: String,
    pub opp_id: String,
    pub result: String,
}

/// POST /api/ai/copilot
///
/// Checked in order: unknown action (400), unknown opportunity (404),
/// generation failure (500). Read-only.
pub async fn copilot(
    State(state): State<CrmState>,
    Json(req): Json<CopilotRequest>,
) -> Result<Json<CopilotResponse>, AppError> {
    let action: CopilotAction = req.action.parse()?;

    let opportunity = state
        .store
        .get_opportunity(&req.opp_id)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".into()))?;

    let contact_id = opportunity.primary_contact_id.clone();
    let activity_filter = ActivityFilter::for_opportunity(&opportunity.opp_id);
    let (organization, contact, activities) = futures::try_join!(
        state.store.get_organization(&opportunity.org_id),
        async {
            match contact_id.as_deref() {
                Some(id) => state.store.get_contact(id).await,
                None => Ok(None),
            }
        },
        state.store.list_activities(&activity_filter),
    )?;

    let snapshot = OpportunitySnapshot {
        opportunity,
        organization,
        contact,
        activity_count: activities.len(),
        extra_context: req.context,
    };
    let result = state.copilot.generate(action, &snapshot).await?;

    Ok(Json(CopilotResponse {
        action: action.to_string(),
        opp_id: req.opp_id,
        result,
    }))
}
