//! CRM request DTOs, read views and domain errors

use crate::neo4j::models::{
    ActivityStatus, ActivityType, BuyingRole, ContactNode, EngagementType, OpportunityNode,
    OpportunitySource, OrganizationNode, StageKind, StrategicTier,
};
use crate::pipeline::rollup::OrgOpportunityStats;
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Domain failures raised by the CRM write paths
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
}

// ============================================================================
// Organizations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub region: Option<String>,
    pub strategic_tier: Option<StrategicTier>,
    pub primary_exec_sponsor: Option<String>,
    pub notes: Option<String>,
    pub google_drive_link: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub strategic_tier: Option<StrategicTier>,
    #[serde(default)]
    pub primary_exec_sponsor: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub google_drive_link: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNoteRequest {
    pub text: String,
}

/// Organization as served to clients, with the derived risk flag
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationView {
    #[serde(flatten)]
    pub organization: OrganizationNode,
    pub is_at_risk: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationSummary {
    pub organization: OrganizationView,
    /// First Decision Maker contact, if any
    pub buyer: Option<ContactNode>,
    pub opportunities: OrgOpportunityStats,
    /// Won engagements, i.e. those under delivery
    pub active_opportunities: Vec<OpportunityNode>,
    /// Open deals
    pub pipeline_opportunities: Vec<OpportunityNode>,
}

// ============================================================================
// Contacts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    pub title: Option<String>,
    pub function: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub buying_role: Option<BuyingRole>,
    pub org_id: String,
    pub notes: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub buying_role: Option<BuyingRole>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

// ============================================================================
// Opportunities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOpportunityRequest {
    pub name: String,
    pub org_id: String,
    pub primary_contact_id: Option<String>,
    pub engagement_type: Option<EngagementType>,
    pub estimated_value: Option<f64>,
    pub confidence_level: Option<i32>,
    pub owner_id: Option<String>,
    /// Defaults to the default pipeline
    pub pipeline_id: Option<String>,
    /// Defaults to the first stage of the pipeline
    pub stage_id: Option<String>,
    pub target_close_date: Option<String>,
    pub source: Option<OpportunitySource>,
    pub notes: Option<String>,
    pub value_hypothesis: Option<String>,
    pub deal_start_date: Option<String>,
    pub deal_end_date: Option<String>,
    pub num_consultants: Option<u32>,
    pub blended_hourly_rate: Option<f64>,
    pub calculated_value: Option<f64>,
}

/// Partial opportunity update. Nullable fields accept `null` to clear.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOpportunityRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub primary_contact_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub engagement_type: Option<Option<EngagementType>>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub confidence_level: Option<i32>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub stage_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub target_close_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub source: Option<Option<OpportunitySource>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub value_hypothesis: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub deal_start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub deal_end_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub num_consultants: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub blended_hourly_rate: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub calculated_value: Option<Option<f64>>,
    /// Version the client last read; a mismatch is rejected as stale
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAtRiskRequest {
    pub is_at_risk: bool,
    #[serde(default)]
    pub at_risk_reason: Option<String>,
}

// ============================================================================
// Activities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivityRequest {
    pub activity_type: ActivityType,
    pub title: Option<String>,
    pub opp_id: Option<String>,
    pub org_id: Option<String>,
    pub due_date: Option<String>,
    pub owner_id: Option<String>,
    pub status: Option<ActivityStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateActivityRequest {
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub opp_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub status: Option<ActivityStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Pipelines & stages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipelineRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePipelineRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStageRequest {
    /// Generated when absent
    pub stage_id: Option<String>,
    pub name: String,
    /// Appended after the last stage when absent
    pub order: Option<i32>,
    pub win_probability: Option<i32>,
    pub auto_activity: Option<String>,
    /// Inferred from the id and name when absent
    pub kind: Option<StageKind>,
}
