//! `CrmStore` implementation for `Neo4jClient`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jClient`.

use anyhow::Result;
use async_trait::async_trait;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::CrmStore;

#[async_trait]
impl CrmStore for Neo4jClient {
    // ========================================================================
    // Users
    // ========================================================================

    async fn create_user(&self, user: &UserNode) -> Result<()> {
        self.upsert_user(user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserNode>> {
        self.get_user(user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserNode>> {
        self.get_user_by_email(email).await
    }

    async fn list_users(&self) -> Result<Vec<UserNode>> {
        self.list_users().await
    }

    async fn update_user(&self, user: &UserNode) -> Result<()> {
        self.upsert_user(user).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.delete_user(user_id).await
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    async fn create_organization(&self, org: &OrganizationNode) -> Result<()> {
        self.upsert_organization(org).await
    }

    async fn get_organization(&self, org_id: &str) -> Result<Option<OrganizationNode>> {
        self.get_organization(org_id).await
    }

    async fn list_organizations(&self) -> Result<Vec<OrganizationNode>> {
        self.list_organizations().await
    }

    async fn update_organization(&self, org: &OrganizationNode) -> Result<()> {
        self.upsert_organization(org).await
    }

    async fn delete_organization(&self, org_id: &str) -> Result<bool> {
        self.delete_organization(org_id).await
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    async fn create_contact(&self, contact: &ContactNode) -> Result<()> {
        self.upsert_contact(contact).await
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactNode>> {
        self.get_contact(contact_id).await
    }

    async fn list_contacts(&self, org_id: Option<&str>) -> Result<Vec<ContactNode>> {
        self.list_contacts(org_id).await
    }

    async fn update_contact(&self, contact: &ContactNode) -> Result<()> {
        self.upsert_contact(contact).await
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<bool> {
        self.delete_contact(contact_id).await
    }

    // ========================================================================
    // Opportunities
    // ========================================================================

    async fn create_opportunity(&self, opp: &OpportunityNode) -> Result<()> {
        self.create_opportunity(opp).await
    }

    async fn get_opportunity(&self, opp_id: &str) -> Result<Option<OpportunityNode>> {
        self.get_opportunity(opp_id).await
    }

    async fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<OpportunityNode>> {
        self.list_opportunities(filter).await
    }

    async fn update_opportunity(
        &self,
        opp: &OpportunityNode,
        expected_version: u64,
    ) -> Result<bool> {
        self.update_opportunity(opp, expected_version).await
    }

    async fn delete_opportunity(&self, opp_id: &str) -> Result<bool> {
        self.delete_opportunity(opp_id).await
    }

    // ========================================================================
    // Activities
    // ========================================================================

    async fn create_activity(&self, activity: &ActivityNode) -> Result<()> {
        self.upsert_activity(activity).await
    }

    async fn get_activity(&self, activity_id: &str) -> Result<Option<ActivityNode>> {
        self.get_activity(activity_id).await
    }

    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityNode>> {
        self.list_activities(filter).await
    }

    async fn update_activity(&self, activity: &ActivityNode) -> Result<()> {
        self.upsert_activity(activity).await
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<bool> {
        self.delete_activity(activity_id).await
    }

    // ========================================================================
    // Pipelines & stages
    // ========================================================================

    async fn create_pipeline(&self, pipeline: &PipelineNode) -> Result<()> {
        self.upsert_pipeline(pipeline).await
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineNode>> {
        self.get_pipeline(pipeline_id).await
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineNode>> {
        self.list_pipelines().await
    }

    async fn update_pipeline(&self, pipeline: &PipelineNode) -> Result<()> {
        self.upsert_pipeline(pipeline).await
    }

    async fn set_default_pipeline(&self, pipeline_id: &str) -> Result<()> {
        self.set_default_pipeline(pipeline_id).await
    }

    async fn create_stage(&self, stage: &StageNode) -> Result<()> {
        self.upsert_stage(stage).await
    }

    async fn get_stage(&self, stage_id: &str) -> Result<Option<StageNode>> {
        self.get_stage(stage_id).await
    }

    async fn list_stages(&self, pipeline_id: Option<&str>) -> Result<Vec<StageNode>> {
        self.list_stages(pipeline_id).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.health_check().await
    }
}
