//! `CrmStore` trait: the entity-store seam.
//!
//! The production implementation lives on [`Neo4jClient`](super::Neo4jClient);
//! tests use the in-memory `MockCrmStore`. Both are shared as `Arc<dyn CrmStore>`.

use super::models::*;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CrmStore: Send + Sync {
    // ========================================================================
    // Users
    // ========================================================================

    async fn create_user(&self, user: &UserNode) -> Result<()>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserNode>>;

    /// Lookup by (already lowercased) email
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserNode>>;

    async fn list_users(&self) -> Result<Vec<UserNode>>;

    async fn update_user(&self, user: &UserNode) -> Result<()>;

    /// Returns false if the user did not exist
    async fn delete_user(&self, user_id: &str) -> Result<bool>;

    // ========================================================================
    // Organizations
    // ========================================================================

    async fn create_organization(&self, org: &OrganizationNode) -> Result<()>;

    async fn get_organization(&self, org_id: &str) -> Result<Option<OrganizationNode>>;

    async fn list_organizations(&self) -> Result<Vec<OrganizationNode>>;

    async fn update_organization(&self, org: &OrganizationNode) -> Result<()>;

    async fn delete_organization(&self, org_id: &str) -> Result<bool>;

    // ========================================================================
    // Contacts
    // ========================================================================

    async fn create_contact(&self, contact: &ContactNode) -> Result<()>;

    async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactNode>>;

    async fn list_contacts(&self, org_id: Option<&str>) -> Result<Vec<ContactNode>>;

    async fn update_contact(&self, contact: &ContactNode) -> Result<()>;

    async fn delete_contact(&self, contact_id: &str) -> Result<bool>;

    // ========================================================================
    // Opportunities
    // ========================================================================

    async fn create_opportunity(&self, opp: &OpportunityNode) -> Result<()>;

    async fn get_opportunity(&self, opp_id: &str) -> Result<Option<OpportunityNode>>;

    async fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<OpportunityNode>>;

    /// Write `opp` only if the stored version still equals `expected_version`.
    /// On success the stored version becomes `expected_version + 1`.
    /// Returns false on a version mismatch or a missing document.
    async fn update_opportunity(&self, opp: &OpportunityNode, expected_version: u64)
        -> Result<bool>;

    /// Delete an opportunity and every activity referencing it.
    async fn delete_opportunity(&self, opp_id: &str) -> Result<bool>;

    // ========================================================================
    // Activities
    // ========================================================================

    async fn create_activity(&self, activity: &ActivityNode) -> Result<()>;

    async fn get_activity(&self, activity_id: &str) -> Result<Option<ActivityNode>>;

    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityNode>>;

    async fn update_activity(&self, activity: &ActivityNode) -> Result<()>;

    async fn delete_activity(&self, activity_id: &str) -> Result<bool>;

    // ========================================================================
    // Pipelines & stages
    // ========================================================================

    async fn create_pipeline(&self, pipeline: &PipelineNode) -> Result<()>;

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineNode>>;

    async fn list_pipelines(&self) -> Result<Vec<PipelineNode>>;

    async fn update_pipeline(&self, pipeline: &PipelineNode) -> Result<()>;

    /// Mark `pipeline_id` as the default and clear the flag on every other pipeline,
    /// in one store operation.
    async fn set_default_pipeline(&self, pipeline_id: &str) -> Result<()>;

    async fn create_stage(&self, stage: &StageNode) -> Result<()>;

    async fn get_stage(&self, stage_id: &str) -> Result<Option<StageNode>>;

    /// Stages sorted by `order` ascending, optionally restricted to one pipeline
    async fn list_stages(&self, pipeline_id: Option<&str>) -> Result<Vec<StageNode>>;

    // ========================================================================
    // Health
    // ========================================================================

    async fn health_check(&self) -> Result<bool>;
}
