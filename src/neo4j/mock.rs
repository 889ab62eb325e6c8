//! In-memory mock implementation of CrmStore for testing.
//!
//! Each entity kind is a `tokio::sync::RwLock<HashMap<String, V>>`.
//! Listings are sorted by creation time to mirror the Neo4j queries.

use crate::neo4j::models::*;
use crate::neo4j::traits::CrmStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory mock implementation of CrmStore for testing.
#[derive(Default)]
pub struct MockCrmStore {
    pub users: RwLock<HashMap<String, UserNode>>,
    pub organizations: RwLock<HashMap<String, OrganizationNode>>,
    pub contacts: RwLock<HashMap<String, ContactNode>>,
    pub opportunities: RwLock<HashMap<String, OpportunityNode>>,
    pub activities: RwLock<HashMap<String, ActivityNode>>,
    pub pipelines: RwLock<HashMap<String, PipelineNode>>,
    pub stages: RwLock<HashMap<String, StageNode>>,
}

impl MockCrmStore {
    /// Create a new empty MockCrmStore.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Builder / seeding methods for tests
    // ========================================================================

    pub async fn with_user(self, user: UserNode) -> Self {
        self.users.write().await.insert(user.user_id.clone(), user);
        self
    }

    pub async fn with_organization(self, org: OrganizationNode) -> Self {
        self.organizations
            .write()
            .await
            .insert(org.org_id.clone(), org);
        self
    }

    pub async fn with_contact(self, contact: ContactNode) -> Self {
        self.contacts
            .write()
            .await
            .insert(contact.contact_id.clone(), contact);
        self
    }

    pub async fn with_opportunity(self, opp: OpportunityNode) -> Self {
        self.opportunities
            .write()
            .await
            .insert(opp.opp_id.clone(), opp);
        self
    }

    pub async fn with_activity(self, activity: ActivityNode) -> Self {
        self.activities
            .write()
            .await
            .insert(activity.activity_id.clone(), activity);
        self
    }

    pub async fn with_pipeline(self, pipeline: PipelineNode) -> Self {
        self.pipelines
            .write()
            .await
            .insert(pipeline.pipeline_id.clone(), pipeline);
        self
    }

    pub async fn with_stage(self, stage: StageNode) -> Self {
        self.stages
            .write()
            .await
            .insert(stage.stage_id.clone(), stage);
        self
    }
}

#[async_trait]
impl CrmStore for MockCrmStore {
    // ========================================================================
    // Users
    // ========================================================================

    async fn create_user(&self, user: &UserNode) -> Result<()> {
        self.users
            .write()
            .await
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserNode>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserNode>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserNode>> {
        let mut users: Vec<UserNode> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user(&self, user: &UserNode) -> Result<()> {
        self.create_user(user).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        Ok(self.users.write().await.remove(user_id).is_some())
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    async fn create_organization(&self, org: &OrganizationNode) -> Result<()> {
        self.organizations
            .write()
            .await
            .insert(org.org_id.clone(), org.clone());
        Ok(())
    }

    async fn get_organization(&self, org_id: &str) -> Result<Option<OrganizationNode>> {
        Ok(self.organizations.read().await.get(org_id).cloned())
    }

    async fn list_organizations(&self) -> Result<Vec<OrganizationNode>> {
        let mut orgs: Vec<OrganizationNode> =
            self.organizations.read().await.values().cloned().collect();
        orgs.sort_by_key(|o| o.created_at);
        Ok(orgs)
    }

    async fn update_organization(&self, org: &OrganizationNode) -> Result<()> {
        self.create_organization(org).await
    }

    async fn delete_organization(&self, org_id: &str) -> Result<bool> {
        Ok(self.organizations.write().await.remove(org_id).is_some())
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    async fn create_contact(&self, contact: &ContactNode) -> Result<()> {
        self.contacts
            .write()
            .await
            .insert(contact.contact_id.clone(), contact.clone());
        Ok(())
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactNode>> {
        Ok(self.contacts.read().await.get(contact_id).cloned())
    }

    async fn list_contacts(&self, org_id: Option<&str>) -> Result<Vec<ContactNode>> {
        let mut contacts: Vec<ContactNode> = self
            .contacts
            .read()
            .await
            .values()
            .filter(|c| org_id.is_none_or(|o| c.org_id == o))
            .cloned()
            .collect();
        contacts.sort_by_key(|c| c.created_at);
        Ok(contacts)
    }

    async fn update_contact(&self, contact: &ContactNode) -> Result<()> {
        self.create_contact(contact).await
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<bool> {
        Ok(self.contacts.write().await.remove(contact_id).is_some())
    }

    // ========================================================================
    // Opportunities
    // ========================================================================

    async fn create_opportunity(&self, opp: &OpportunityNode) -> Result<()> {
        self.opportunities
            .write()
            .await
            .insert(opp.opp_id.clone(), opp.clone());
        Ok(())
    }

    async fn get_opportunity(&self, opp_id: &str) -> Result<Option<OpportunityNode>> {
        Ok(self.opportunities.read().await.get(opp_id).cloned())
    }

    async fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<OpportunityNode>> {
        let mut opps: Vec<OpportunityNode> = self
            .opportunities
            .read()
            .await
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        opps.sort_by_key(|o| o.created_at);
        Ok(opps)
    }

    async fn update_opportunity(
        &self,
        opp: &OpportunityNode,
        expected_version: u64,
    ) -> Result<bool> {
        let mut opps = self.opportunities.write().await;
        match opps.get(&opp.opp_id) {
            Some(current) if current.version == expected_version => {
                let mut stored = opp.clone();
                stored.version = expected_version + 1;
                opps.insert(stored.opp_id.clone(), stored);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_opportunity(&self, opp_id: &str) -> Result<bool> {
        self.activities
            .write()
            .await
            .retain(|_, a| a.opp_id.as_deref() != Some(opp_id));
        Ok(self.opportunities.write().await.remove(opp_id).is_some())
    }

    // ========================================================================
    // Activities
    // ========================================================================

    async fn create_activity(&self, activity: &ActivityNode) -> Result<()> {
        self.activities
            .write()
            .await
            .insert(activity.activity_id.clone(), activity.clone());
        Ok(())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<Option<ActivityNode>> {
        Ok(self.activities.read().await.get(activity_id).cloned())
    }

    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityNode>> {
        let mut activities: Vec<ActivityNode> = self
            .activities
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        activities.sort_by_key(|a| a.created_at);
        Ok(activities)
    }

    async fn update_activity(&self, activity: &ActivityNode) -> Result<()> {
        self.create_activity(activity).await
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<bool> {
        Ok(self.activities.write().await.remove(activity_id).is_some())
    }

    // ========================================================================
    // Pipelines & stages
    // ========================================================================

    async fn create_pipeline(&self, pipeline: &PipelineNode) -> Result<()> {
        self.pipelines
            .write()
            .await
            .insert(pipeline.pipeline_id.clone(), pipeline.clone());
        Ok(())
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineNode>> {
        Ok(self.pipelines.read().await.get(pipeline_id).cloned())
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineNode>> {
        let mut pipelines: Vec<PipelineNode> =
            self.pipelines.read().await.values().cloned().collect();
        pipelines.sort_by_key(|p| p.created_at);
        Ok(pipelines)
    }

    async fn update_pipeline(&self, pipeline: &PipelineNode) -> Result<()> {
        self.create_pipeline(pipeline).await
    }

    async fn set_default_pipeline(&self, pipeline_id: &str) -> Result<()> {
        for pipeline in self.pipelines.write().await.values_mut() {
            pipeline.is_default = pipeline.pipeline_id == pipeline_id;
        }
        Ok(())
    }

    async fn create_stage(&self, stage: &StageNode) -> Result<()> {
        self.stages
            .write()
            .await
            .insert(stage.stage_id.clone(), stage.clone());
        Ok(())
    }

    async fn get_stage(&self, stage_id: &str) -> Result<Option<StageNode>> {
        Ok(self.stages.read().await.get(stage_id).cloned())
    }

    async fn list_stages(&self, pipeline_id: Option<&str>) -> Result<Vec<StageNode>> {
        let mut stages: Vec<StageNode> = self
            .stages
            .read()
            .await
            .values()
            .filter(|s| pipeline_id.is_none_or(|p| s.pipeline_id == p))
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.order);
        Ok(stages)
    }

    // ========================================================================
    // Health
    // ========================================================================

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
