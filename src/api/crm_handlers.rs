//! Entity handlers: organizations, contacts, opportunities, activities

use super::handlers::{deleted, AppError, CrmState};
use super::query::{ActivitiesQuery, ContactsQuery, OpportunitiesQuery};
use crate::auth::AuthUser;
use crate::crm::*;
use crate::neo4j::models::{
    ActivityFilter, ActivityNode, ContactNode, OpportunityFilter, OpportunityNode,
    OrganizationNode,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

// ============================================================================
// Organizations
// ============================================================================

/// List organizations with their derived risk flag
pub async fn list_organizations(
    State(state): State<CrmState>,
) -> Result<Json<Vec<OrganizationView>>, AppError> {
    Ok(Json(state.crm.list_organization_views().await?))
}

pub async fn create_organization(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<Json<OrganizationNode>, AppError> {
    let org = state.crm.create_organization(req, &user.user_id).await?;
    Ok(Json(org))
}

pub async fn get_organization(
    State(state): State<CrmState>,
    Path(org_id): Path<String>,
) -> Result<Json<OrganizationView>, AppError> {
    let view = state
        .crm
        .get_organization_view(&org_id)
        .await?
        .ok_or(AppError::NotFound("Organization not found".into()))?;
    Ok(Json(view))
}

pub async fn update_organization(
    State(state): State<CrmState>,
    Path(org_id): Path<String>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationView>, AppError> {
    let view = state
        .crm
        .update_organization(&org_id, req)
        .await?
        .ok_or(AppError::NotFound("Organization not found".into()))?;
    Ok(Json(view))
}

pub async fn delete_organization(
    State(state): State<CrmState>,
    Path(org_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.crm.delete_organization(&org_id).await?;
    Ok(deleted())
}

/// Organization with buyer, deal statistics and won/open deal lists
pub async fn get_organization_summary(
    State(state): State<CrmState>,
    Path(org_id): Path<String>,
) -> Result<Json<OrganizationSummary>, AppError> {
    let summary = state
        .crm
        .organization_summary(&org_id)
        .await?
        .ok_or(AppError::NotFound("Organization not found".into()))?;
    Ok(Json(summary))
}

/// Append a note to the organization's history
pub async fn add_organization_note(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(req): Json<AddNoteRequest>,
) -> Result<Json<OrganizationView>, AppError> {
    let view = state
        .crm
        .add_organization_note(&org_id, &req.text, &user.user_id, &user.name)
        .await?;
    Ok(Json(view))
}

// ============================================================================
// Contacts
// ============================================================================

pub async fn list_contacts(
    State(state): State<CrmState>,
    Query(query): Query<ContactsQuery>,
) -> Result<Json<Vec<ContactNode>>, AppError> {
    Ok(Json(state.store.list_contacts(query.org_id()).await?))
}

pub async fn create_contact(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<CreateContactRequest>,
) -> Result<Json<ContactNode>, AppError> {
    Ok(Json(state.crm.create_contact(req, &user.user_id).await?))
}

pub async fn get_contact(
    State(state): State<CrmState>,
    Path(contact_id): Path<String>,
) -> Result<Json<ContactNode>, AppError> {
    let contact = state
        .store
        .get_contact(&contact_id)
        .await?
        .ok_or(AppError::NotFound("Contact not found".into()))?;
    Ok(Json(contact))
}

pub async fn update_contact(
    State(state): State<CrmState>,
    Path(contact_id): Path<String>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<Json<ContactNode>, AppError> {
    let contact = state
        .crm
        .update_contact(&contact_id, req)
        .await?
        .ok_or(AppError::NotFound("Contact not found".into()))?;
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<CrmState>,
    Path(contact_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.delete_contact(&contact_id).await?;
    Ok(deleted())
}

// ============================================================================
// Opportunities
// ============================================================================

pub async fn list_opportunities(
    State(state): State<CrmState>,
    Query(query): Query<OpportunitiesQuery>,
) -> Result<Json<Vec<OpportunityNode>>, AppError> {
    let filter = OpportunityFilter::from(query);
    Ok(Json(state.store.list_opportunities(&filter).await?))
}

/// Create an opportunity; fires the entry automation of its first stage
pub async fn create_opportunity(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<CreateOpportunityRequest>,
) -> Result<Json<OpportunityNode>, AppError> {
    Ok(Json(state.crm.create_opportunity(req, &user.user_id).await?))
}

pub async fn get_opportunity(
    State(state): State<CrmState>,
    Path(opp_id): Path<String>,
) -> Result<Json<OpportunityNode>, AppError> {
    let opp = state
        .store
        .get_opportunity(&opp_id)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".into()))?;
    Ok(Json(opp))
}

/// Partial update. A stage change runs the stage transition handler;
/// a stale `version` is rejected with 409.
pub async fn update_opportunity(
    State(state): State<CrmState>,
    user: AuthUser,
    Path(opp_id): Path<String>,
    Json(req): Json<UpdateOpportunityRequest>,
) -> Result<Json<OpportunityNode>, AppError> {
    let opp = state
        .crm
        .update_opportunity(&opp_id, req, &user.user_id)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".into()))?;
    Ok(Json(opp))
}

/// Delete an opportunity and its activities
pub async fn delete_opportunity(
    State(state): State<CrmState>,
    Path(opp_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.delete_opportunity(&opp_id).await?;
    Ok(deleted())
}

/// Set or clear the manual at-risk flag
pub async fn set_opportunity_at_risk(
    State(state): State<CrmState>,
    Path(opp_id): Path<String>,
    Json(req): Json<SetAtRiskRequest>,
) -> Result<Json<OpportunityNode>, AppError> {
    let opp = state
        .crm
        .set_opportunity_at_risk(&opp_id, req)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".into()))?;
    Ok(Json(opp))
}

// ============================================================================
// Activities
// ============================================================================

pub async fn list_activities(
    State(state): State<CrmState>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<Vec<ActivityNode>>, AppError> {
    let filter = ActivityFilter::from(query);
    Ok(Json(state.store.list_activities(&filter).await?))
}

pub async fn create_activity(
    State(state): State<CrmState>,
    user: AuthUser,
    Json(req): Json<CreateActivityRequest>,
) -> Result<Json<ActivityNode>, AppError> {
    Ok(Json(state.crm.create_activity(req, &user.user_id).await?))
}

pub async fn get_activity(
    State(state): State<CrmState>,
    Path(activity_id): Path<String>,
) -> Result<Json<ActivityNode>, AppError> {
    let activity = state
        .store
        .get_activity(&activity_id)
        .await?
        .ok_or(AppError::NotFound("Activity not found".into()))?;
    Ok(Json(activity))
}

pub async fn update_activity(
    State(state): State<CrmState>,
    Path(activity_id): Path<String>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<Json<ActivityNode>, AppError> {
    let activity = state
        .crm
        .update_activity(&activity_id, req)
        .await?
        .ok_or(AppError::NotFound("Activity not found".into()))?;
    Ok(Json(activity))
}

pub async fn delete_activity(
    State(state): State<CrmState>,
    Path(activity_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.delete_activity(&activity_id).await?;
    Ok(deleted())
}
