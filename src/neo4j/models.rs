//! CRM entity models persisted in the Neo4j store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a prefixed opaque id, e.g. `opp_3f2a9c0d1b7e`.
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..12])
}

// ============================================================================
// Users
// ============================================================================

/// Role of an authenticated user. Admin-only operations gate on this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    SalesLead,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SalesLead => "sales_lead",
            UserRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales_lead" => Ok(UserRole::SalesLead),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!(
                "Invalid role '{}': expected 'sales_lead' or 'admin'",
                other
            )),
        }
    }
}

/// A CRM user (employee)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNode {
    pub user_id: String,
    /// Always stored lowercased
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub picture: Option<String>,
    /// Bcrypt hash. Clients only ever see `UserResponse`.
    #[serde(default)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserNode {
    pub fn new(email: &str, name: String, role: UserRole, password_hash: Option<String>) -> Self {
        Self {
            user_id: new_id("user"),
            email: email.trim().to_lowercase(),
            name,
            role,
            picture: None,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Organizations
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum StrategicTier {
    Target,
    #[default]
    Active,
    Strategic,
}

/// One timestamped entry in an organization's note history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteEntry {
    pub note_id: String,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// A client or prospect organization.
///
/// The at-risk signal is derived on read (see `pipeline::risk`) and is
/// intentionally absent from the stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationNode {
    pub org_id: String,
    pub name: String,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub strategic_tier: StrategicTier,
    pub primary_exec_sponsor: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub notes_history: Vec<NoteEntry>,
    #[serde(default)]
    pub google_drive_link: Option<String>,
    pub owner_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Contacts
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BuyingRole {
    #[serde(rename = "Decision Maker")]
    DecisionMaker,
    Influencer,
    Champion,
}

/// A person at an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactNode {
    pub contact_id: String,
    pub name: String,
    pub title: Option<String>,
    /// Functional area (IT, Data, AI, Finance, Ops...)
    pub function: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub buying_role: Option<BuyingRole>,
    pub org_id: String,
    pub notes: Option<String>,
    pub owner_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Pipelines & stages
// ============================================================================

/// A sales pipeline. Exactly one pipeline carries `is_default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineNode {
    pub pipeline_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Terminal state of a stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    #[default]
    Open,
    Won,
    Lost,
}

impl StageKind {
    /// Legacy convention: a stage id containing "won" / "lost"
    /// (case-insensitive) is terminal. Anything else is open.
    pub fn from_stage_id(stage_id: &str) -> Self {
        let lower = stage_id.to_lowercase();
        if lower.contains("won") {
            StageKind::Won
        } else if lower.contains("lost") {
            StageKind::Lost
        } else {
            StageKind::Open
        }
    }

    /// Classify a new stage from its id, falling back to its display name.
    pub fn infer(stage_id: &str, name: &str) -> Self {
        match Self::from_stage_id(stage_id) {
            StageKind::Open => Self::from_stage_id(name),
            kind => kind,
        }
    }
}

/// An ordered step within a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageNode {
    pub stage_id: String,
    pub pipeline_id: String,
    pub name: String,
    pub order: i32,
    #[serde(default)]
    pub win_probability: i32,
    /// Template for the follow-up activity created when an opportunity enters this stage
    pub auto_activity: Option<String>,
    #[serde(default)]
    pub kind: StageKind,
    pub created_at: DateTime<Utc>,
}

impl StageNode {
    /// The follow-up template, if one is configured and non-blank.
    pub fn auto_activity_template(&self) -> Option<&str> {
        self.auto_activity
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

// ============================================================================
// Opportunities
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EngagementType {
    Advisory,
    Strategy,
    #[serde(rename = "AI Enablement")]
    AiEnablement,
    #[serde(rename = "Data Modernization")]
    DataModernization,
    #[serde(rename = "Platform / Architecture")]
    PlatformArchitecture,
    Transformation,
}

impl EngagementType {
    pub fn label(&self) -> &'static str {
        match self {
            EngagementType::Advisory => "Advisory",
            EngagementType::Strategy => "Strategy",
            EngagementType::AiEnablement => "AI Enablement",
            EngagementType::DataModernization => "Data Modernization",
            EngagementType::PlatformArchitecture => "Platform / Architecture",
            EngagementType::Transformation => "Transformation",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OpportunitySource {
    Inbound,
    Referral,
    #[serde(rename = "Exec Intro")]
    ExecIntro,
    Expansion,
}

/// A tracked sales deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityNode {
    pub opp_id: String,
    pub name: String,
    pub org_id: String,
    pub primary_contact_id: Option<String>,
    pub engagement_type: Option<EngagementType>,
    #[serde(default)]
    pub estimated_value: f64,
    /// Percentage, 0-100
    #[serde(default)]
    pub confidence_level: i32,
    pub owner_id: String,
    pub pipeline_id: String,
    pub stage_id: String,
    /// Denormalized from the stage when `stage_id` is written
    #[serde(default)]
    pub stage_kind: StageKind,
    pub target_close_date: Option<String>,
    pub source: Option<OpportunitySource>,
    pub notes: Option<String>,
    pub value_hypothesis: Option<String>,
    #[serde(default)]
    pub is_at_risk: bool,
    #[serde(default)]
    pub at_risk_reason: Option<String>,

    // Deal builder
    #[serde(default)]
    pub deal_start_date: Option<String>,
    #[serde(default)]
    pub deal_end_date: Option<String>,
    #[serde(default)]
    pub num_consultants: Option<u32>,
    #[serde(default)]
    pub blended_hourly_rate: Option<f64>,
    #[serde(default)]
    pub calculated_value: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stage_entered_at: DateTime<Utc>,
    /// Write counter for optimistic concurrency
    #[serde(default)]
    pub version: u64,
}

impl OpportunityNode {
    /// Value scaled by the confidence percentage.
    pub fn weighted_value(&self) -> f64 {
        self.estimated_value * f64::from(self.confidence_level) / 100.0
    }
}

// ============================================================================
// Activities
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivityType {
    Call,
    Email,
    Meeting,
    Demo,
    Workshop,
    #[serde(rename = "Discovery Session")]
    DiscoverySession,
    #[serde(rename = "Follow-up")]
    FollowUp,
    #[serde(rename = "Exec Readout")]
    ExecReadout,
    Other,
}

/// Stored activity status. `Overdue` is advisory and only set explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ActivityStatus {
    #[default]
    Planned,
    Completed,
    Overdue,
}

impl std::str::FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Planned" => Ok(ActivityStatus::Planned),
            "Completed" => Ok(ActivityStatus::Completed),
            "Overdue" => Ok(ActivityStatus::Overdue),
            other => Err(format!("Invalid activity status '{}'", other)),
        }
    }
}

/// A call, meeting or other touchpoint, linked to an opportunity and/or organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityNode {
    pub activity_id: String,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub title: Option<String>,
    pub opp_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Kept as supplied; parsed leniently when aggregating
    pub due_date: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub status: ActivityStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Query filters
// ============================================================================

/// Optional equality filters for listing opportunities
#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter {
    pub pipeline_id: Option<String>,
    pub owner_id: Option<String>,
    pub org_id: Option<String>,
}

impl OpportunityFilter {
    pub fn matches(&self, opp: &OpportunityNode) -> bool {
        self.pipeline_id.as_ref().is_none_or(|p| *p == opp.pipeline_id)
            && self.owner_id.as_ref().is_none_or(|o| *o == opp.owner_id)
            && self.org_id.as_ref().is_none_or(|o| *o == opp.org_id)
    }
}

/// Optional equality filters for listing activities
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub opp_id: Option<String>,
    pub org_id: Option<String>,
    pub owner_id: Option<String>,
    pub status: Option<ActivityStatus>,
}

impl ActivityFilter {
    pub fn for_opportunity(opp_id: &str) -> Self {
        Self {
            opp_id: Some(opp_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, activity: &ActivityNode) -> bool {
        self.opp_id
            .as_ref()
            .is_none_or(|o| activity.opp_id.as_ref() == Some(o))
            && self
                .org_id
                .as_ref()
                .is_none_or(|o| activity.org_id.as_ref() == Some(o))
            && self.owner_id.as_ref().is_none_or(|o| *o == activity.owner_id)
            && self.status.is_none_or(|s| s == activity.status)
    }
}

// ============================================================================
// Tests
// ============================================================================
