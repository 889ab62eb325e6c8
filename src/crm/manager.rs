//! CRM write paths and read views
//!
//! Owns the invariants that span more than one document: owner defaulting,
//! partial updates, the single default pipeline, the opportunity version
//! check, and stage-entry automation.

use super::models::*;
use crate::neo4j::models::*;
use crate::neo4j::CrmStore;
use crate::pipeline::risk::{at_risk_by_org, org_is_at_risk, relevant_activities};
use crate::pipeline::rollup::{categorize, org_opportunity_stats};
use crate::pipeline::transition::{enter_stage, is_stage_change};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

fn not_found(what: &str) -> anyhow::Error {
    CrmError::NotFound(what.to_string()).into()
}

fn invalid(msg: impl Into<String>) -> anyhow::Error {
    CrmError::Validation(msg.into()).into()
}

fn stale_write() -> anyhow::Error {
    CrmError::Conflict("Opportunity was modified by another request; reload and retry".into())
        .into()
}

fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_deal_numbers(value: Option<f64>, confidence: Option<i32>) -> Result<()> {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            return Err(invalid("estimated_value must be >= 0"));
        }
    }
    if let Some(c) = confidence {
        if !(0..=100).contains(&c) {
            return Err(invalid("confidence_level must be between 0 and 100"));
        }
    }
    Ok(())
}

/// Manager for CRM entity operations
#[derive(Clone)]
pub struct CrmManager {
    store: Arc<dyn CrmStore>,
}

impl CrmManager {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    /// Direct store access for read-only views
    pub fn store(&self) -> &Arc<dyn CrmStore> {
        &self.store
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    pub async fn create_organization(
        &self,
        req: CreateOrganizationRequest,
        actor_id: &str,
    ) -> Result<OrganizationNode> {
        require_non_empty(&req.name, "name")?;
        let now = Utc::now();
        let org = OrganizationNode {
            org_id: new_id("org"),
            name: req.name.trim().to_string(),
            industry: req.industry,
            company_size: req.company_size,
            region: req.region,
            strategic_tier: req.strategic_tier.unwrap_or_default(),
            primary_exec_sponsor: req.primary_exec_sponsor,
            notes: req.notes,
            notes_history: Vec::new(),
            google_drive_link: req.google_drive_link,
            owner_id: req.owner_id.unwrap_or_else(|| actor_id.to_string()),
            created_by: actor_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.create_organization(&org).await?;
        Ok(org)
    }

    /// Organization with its risk flag computed against current activity
    pub async fn get_organization_view(&self, org_id: &str) -> Result<Option<OrganizationView>> {
        let org = match self.store.get_organization(org_id).await? {
            Some(org) => org,
            None => return Ok(None),
        };
        Ok(Some(self.view_of(org).await?))
    }

    async fn view_of(&self, org: OrganizationNode) -> Result<OrganizationView> {
        let opps = self
            .store
            .list_opportunities(&OpportunityFilter {
                org_id: Some(org.org_id.clone()),
                ..Default::default()
            })
            .await?;
        let activities = self.store.list_activities(&ActivityFilter::default()).await?;
        let relevant = relevant_activities(&org.org_id, &opps, &activities);
        let is_at_risk = org_is_at_risk(org.created_at, relevant, Utc::now());
        Ok(OrganizationView {
            organization: org,
            is_at_risk,
        })
    }

    pub async fn list_organization_views(&self) -> Result<Vec<OrganizationView>> {
        let opp_filter = OpportunityFilter::default();
        let activity_filter = ActivityFilter::default();
        let (orgs, opps, activities) = futures::try_join!(
            self.store.list_organizations(),
            self.store.list_opportunities(&opp_filter),
            self.store.list_activities(&activity_filter),
        )?;
        let flags = at_risk_by_org(&orgs, &opps, &activities, Utc::now());
        Ok(orgs
            .into_iter()
            .map(|org| {
                let is_at_risk = flags.get(&org.org_id).copied().unwrap_or(false);
                OrganizationView {
                    organization: org,
                    is_at_risk,
                }
            })
            .collect())
    }

    pub async fn update_organization(
        &self,
        org_id: &str,
        req: UpdateOrganizationRequest,
    ) -> Result<Option<OrganizationView>> {
        let mut org = match self.store.get_organization(org_id).await? {
            Some(org) => org,
            None => return Ok(None),
        };

        if let Some(name) = req.name {
            require_non_empty(&name, "name")?;
            org.name = name.trim().to_string();
        }
        if let Some(v) = req.industry {
            org.industry = Some(v);
        }
        if let Some(v) = req.company_size {
            org.company_size = Some(v);
        }
        if let Some(v) = req.region {
            org.region = Some(v);
        }
        if let Some(v) = req.strategic_tier {
            org.strategic_tier = v;
        }
        if let Some(v) = req.primary_exec_sponsor {
            org.primary_exec_sponsor = Some(v);
        }
        if let Some(v) = req.notes {
            org.notes = Some(v);
        }
        if let Some(v) = req.google_drive_link {
            org.google_drive_link = Some(v);
        }
        if let Some(v) = req.owner_id {
            org.owner_id = v;
        }
        org.updated_at = Utc::now();

        self.store.update_organization(&org).await?;
        Ok(Some(self.view_of(org).await?))
    }

    pub async fn delete_organization(&self, org_id: &str) -> Result<bool> {
        self.store.delete_organization(org_id).await
    }

    /// Append a timestamped note to the organization's history
    pub async fn add_organization_note(
        &self,
        org_id: &str,
        text: &str,
        author_id: &str,
        author_name: &str,
    ) -> Result<OrganizationView> {
        if text.trim().is_empty() {
            return Err(invalid("Note text is required"));
        }
        let mut org = self
            .store
            .get_organization(org_id)
            .await?
            .ok_or_else(|| not_found("Organization"))?;

        let now = Utc::now();
        org.notes_history.push(NoteEntry {
            note_id: new_id("note"),
            text: text.to_string(),
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            created_at: now,
        });
        org.updated_at = now;

        self.store.update_organization(&org).await?;
        self.view_of(org).await
    }

    pub async fn organization_summary(&self, org_id: &str) -> Result<Option<OrganizationSummary>> {
        let organization = match self.get_organization_view(org_id).await? {
            Some(view) => view,
            None => return Ok(None),
        };

        let opp_filter = OpportunityFilter {
            org_id: Some(org_id.to_string()),
            ..Default::default()
        };
        let (contacts, opps) = futures::try_join!(
            self.store.list_contacts(Some(org_id)),
            self.store.list_opportunities(&opp_filter),
        )?;

        let buyer = contacts
            .into_iter()
            .find(|c| c.buying_role == Some(BuyingRole::DecisionMaker));
        let stats = org_opportunity_stats(&opps);
        let categorized = categorize(&opps);
        let active_opportunities = categorized.won.into_iter().cloned().collect();
        let pipeline_opportunities = categorized.open.into_iter().cloned().collect();

        Ok(Some(OrganizationSummary {
            organization,
            buyer,
            opportunities: stats,
            active_opportunities,
            pipeline_opportunities,
        }))
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    pub async fn create_contact(
        &self,
        req: CreateContactRequest,
        actor_id: &str,
    ) -> Result<ContactNode> {
        require_non_empty(&req.name, "name")?;
        require_non_empty(&req.org_id, "org_id")?;
        let now = Utc::now();
        let contact = ContactNode {
            contact_id: new_id("contact"),
            name: req.name.trim().to_string(),
            title: req.title,
            function: req.function,
            email: req.email,
            phone: req.phone,
            buying_role: req.buying_role,
            org_id: req.org_id,
            notes: req.notes,
            owner_id: req.owner_id.unwrap_or_else(|| actor_id.to_string()),
            created_by: actor_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.create_contact(&contact).await?;
        Ok(contact)
    }

    pub async fn update_contact(
        &self,
        contact_id: &str,
        req: UpdateContactRequest,
    ) -> Result<Option<ContactNode>> {
        let mut contact = match self.store.get_contact(contact_id).await? {
            Some(c) => c,
            None => return Ok(None),
        };

        if let Some(name) = req.name {
            require_non_empty(&name, "name")?;
            contact.name = name.trim().to_string();
        }
        if let Some(v) = req.title {
            contact.title = Some(v);
        }
        if let Some(v) = req.function {
            contact.function = Some(v);
        }
        if let Some(v) = req.email {
            contact.email = Some(v);
        }
        if let Some(v) = req.phone {
            contact.phone = Some(v);
        }
        if let Some(v) = req.buying_role {
            contact.buying_role = Some(v);
        }
        if let Some(v) = req.org_id {
            require_non_empty(&v, "org_id")?;
            contact.org_id = v;
        }
        if let Some(v) = req.notes {
            contact.notes = Some(v);
        }
        if let Some(v) = req.owner_id {
            contact.owner_id = v;
        }
        contact.updated_at = Utc::now();

        self.store.update_contact(&contact).await?;
        Ok(Some(contact))
    }

    // ========================================================================
    // Opportunities
    // ========================================================================

    /// Persist the follow-up produced by a stage entry, if any
    async fn record_follow_up(&self, follow_up: Option<ActivityNode>) -> Result<()> {
        if let Some(activity) = follow_up {
            tracing::info!(
                opp_id = activity.opp_id.as_deref().unwrap_or_default(),
                activity_id = %activity.activity_id,
                "Created stage follow-up activity"
            );
            self.store.create_activity(&activity).await?;
        }
        Ok(())
    }

    async fn resolve_pipeline(&self, pipeline_id: Option<&str>) -> Result<PipelineNode> {
        match pipeline_id {
            Some(id) => self
                .store
                .get_pipeline(id)
                .await?
                .ok_or_else(|| invalid(format!("Pipeline '{}' does not exist", id))),
            None => self
                .default_pipeline()
                .await?
                .ok_or_else(|| invalid("No default pipeline configured")),
        }
    }

    pub async fn create_opportunity(
        &self,
        req: CreateOpportunityRequest,
        actor_id: &str,
    ) -> Result<OpportunityNode> {
        require_non_empty(&req.name, "name")?;
        validate_deal_numbers(req.estimated_value, req.confidence_level)?;
        if self.store.get_organization(&req.org_id).await?.is_none() {
            return Err(invalid(format!(
                "Organization '{}' does not exist",
                req.org_id
            )));
        }

        let pipeline = self.resolve_pipeline(req.pipeline_id.as_deref()).await?;
        let stage_id = match req.stage_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => id,
            None => self
                .store
                .list_stages(Some(&pipeline.pipeline_id))
                .await?
                .into_iter()
                .next()
                .map(|s| s.stage_id)
                .ok_or_else(|| invalid("Pipeline has no stages"))?,
        };
        let stage = self.store.get_stage(&stage_id).await?;

        let now = Utc::now();
        let mut opp = OpportunityNode {
            opp_id: new_id("opp"),
            name: req.name.trim().to_string(),
            org_id: req.org_id,
            primary_contact_id: req.primary_contact_id,
            engagement_type: req.engagement_type,
            estimated_value: req.estimated_value.unwrap_or(0.0),
            confidence_level: req.confidence_level.unwrap_or(50),
            owner_id: req.owner_id.unwrap_or_else(|| actor_id.to_string()),
            pipeline_id: pipeline.pipeline_id,
            stage_id,
            stage_kind: StageKind::Open,
            target_close_date: req.target_close_date,
            source: req.source,
            notes: req.notes,
            value_hypothesis: req.value_hypothesis,
            is_at_risk: false,
            at_risk_reason: None,
            deal_start_date: req.deal_start_date,
            deal_end_date: req.deal_end_date,
            num_consultants: req.num_consultants,
            blended_hourly_rate: req.blended_hourly_rate,
            calculated_value: req.calculated_value,
            created_at: now,
            updated_at: now,
            stage_entered_at: now,
            version: 0,
        };

        let follow_up = enter_stage(&mut opp, stage.as_ref(), actor_id, now);
        self.store.create_opportunity(&opp).await?;
        self.record_follow_up(follow_up).await?;

        Ok(opp)
    }

    /// Apply a partial update. A stage change triggers stage-entry automation
    /// once the version-checked write has succeeded.
    pub async fn update_opportunity(
        &self,
        opp_id: &str,
        req: UpdateOpportunityRequest,
        actor_id: &str,
    ) -> Result<Option<OpportunityNode>> {
        let mut opp = match self.store.get_opportunity(opp_id).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let expected_version = opp.version;
        if req.version.is_some_and(|v| v != expected_version) {
            return Err(stale_write());
        }
        validate_deal_numbers(req.estimated_value, req.confidence_level)?;

        let previous_stage = opp.stage_id.clone();

        if let Some(name) = req.name {
            require_non_empty(&name, "name")?;
            opp.name = name.trim().to_string();
        }
        if let Some(org_id) = req.org_id {
            if self.store.get_organization(&org_id).await?.is_none() {
                return Err(invalid(format!("Organization '{}' does not exist", org_id)));
            }
            opp.org_id = org_id;
        }
        if let Some(v) = req.primary_contact_id {
            opp.primary_contact_id = v;
        }
        if let Some(v) = req.engagement_type {
            opp.engagement_type = v;
        }
        if let Some(v) = req.estimated_value {
            opp.estimated_value = v;
        }
        if let Some(v) = req.confidence_level {
            opp.confidence_level = v;
        }
        if let Some(v) = req.owner_id {
            opp.owner_id = v;
        }
        if let Some(pipeline_id) = req.pipeline_id {
            opp.pipeline_id = self.resolve_pipeline(Some(&pipeline_id)).await?.pipeline_id;
        }
        if let Some(v) = req.stage_id {
            require_non_empty(&v, "stage_id")?;
            opp.stage_id = v;
        }
        if let Some(v) = req.target_close_date {
            opp.target_close_date = v;
        }
        if let Some(v) = req.source {
            opp.source = v;
        }
        if let Some(v) = req.notes {
            opp.notes = v;
        }
        if let Some(v) = req.value_hypothesis {
            opp.value_hypothesis = v;
        }
        if let Some(v) = req.deal_start_date {
            opp.deal_start_date = v;
        }
        if let Some(v) = req.deal_end_date {
            opp.deal_end_date = v;
        }
        if let Some(v) = req.num_consultants {
            opp.num_consultants = v;
        }
        if let Some(v) = req.blended_hourly_rate {
            opp.blended_hourly_rate = v;
        }
        if let Some(v) = req.calculated_value {
            opp.calculated_value = v;
        }

        let now = Utc::now();
        opp.updated_at = now;

        let follow_up = if is_stage_change(&previous_stage, &opp.stage_id) {
            tracing::debug!(
                opp_id,
                from = %previous_stage,
                to = %opp.stage_id,
                "Opportunity changed stage"
            );
            let stage = self.store.get_stage(&opp.stage_id).await?;
            enter_stage(&mut opp, stage.as_ref(), actor_id, now)
        } else {
            None
        };

        if !self.store.update_opportunity(&opp, expected_version).await? {
            return Err(stale_write());
        }
        opp.version = expected_version + 1;
        self.record_follow_up(follow_up).await?;

        Ok(Some(opp))
    }

    /// Set or clear the manual risk flag. Clearing also clears the reason.
    pub async fn set_opportunity_at_risk(
        &self,
        opp_id: &str,
        req: SetAtRiskRequest,
    ) -> Result<Option<OpportunityNode>> {
        let mut opp = match self.store.get_opportunity(opp_id).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let expected_version = opp.version;

        opp.is_at_risk = req.is_at_risk;
        opp.at_risk_reason = if req.is_at_risk {
            req.at_risk_reason
        } else {
            None
        };
        opp.updated_at = Utc::now();

        if !self.store.update_opportunity(&opp, expected_version).await? {
            return Err(stale_write());
        }
        opp.version = expected_version + 1;
        Ok(Some(opp))
    }

    /// Logging activity on a deal counts as addressing its risk.
    async fn clear_manual_risk(&self, opp_id: &str) -> Result<()> {
        let mut opp = match self.store.get_opportunity(opp_id).await? {
            Some(o) if o.is_at_risk || o.at_risk_reason.is_some() => o,
            _ => return Ok(()),
        };
        let expected_version = opp.version;
        opp.is_at_risk = false;
        opp.at_risk_reason = None;
        opp.updated_at = Utc::now();

        if !self.store.update_opportunity(&opp, expected_version).await? {
            tracing::warn!(opp_id, "Risk flag not cleared: concurrent update");
        }
        Ok(())
    }

    // ========================================================================
    // Activities
    // ========================================================================

    pub async fn create_activity(
        &self,
        req: CreateActivityRequest,
        actor_id: &str,
    ) -> Result<ActivityNode> {
        let now = Utc::now();
        let activity = ActivityNode {
            activity_id: new_id("act"),
            activity_type: req.activity_type,
            title: req.title,
            opp_id: req.opp_id.filter(|id| !id.is_empty()),
            org_id: req.org_id.filter(|id| !id.is_empty()),
            due_date: req.due_date,
            owner_id: req.owner_id.unwrap_or_else(|| actor_id.to_string()),
            status: req.status.unwrap_or_default(),
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };
        self.store.create_activity(&activity).await?;

        if let Some(opp_id) = activity.opp_id.as_deref() {
            self.clear_manual_risk(opp_id).await?;
        }

        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        activity_id: &str,
        req: UpdateActivityRequest,
    ) -> Result<Option<ActivityNode>> {
        let mut activity = match self.store.get_activity(activity_id).await? {
            Some(a) => a,
            None => return Ok(None),
        };

        if let Some(v) = req.activity_type {
            activity.activity_type = v;
        }
        if let Some(v) = req.title {
            activity.title = Some(v);
        }
        if let Some(v) = req.opp_id {
            activity.opp_id = Some(v).filter(|id| !id.is_empty());
        }
        if let Some(v) = req.org_id {
            activity.org_id = Some(v).filter(|id| !id.is_empty());
        }
        if let Some(v) = req.due_date {
            activity.due_date = Some(v);
        }
        if let Some(v) = req.owner_id {
            activity.owner_id = v;
        }
        if let Some(v) = req.status {
            activity.status = v;
        }
        if let Some(v) = req.notes {
            activity.notes = Some(v);
        }
        activity.updated_at = Utc::now();

        self.store.update_activity(&activity).await?;
        Ok(Some(activity))
    }

    // ========================================================================
    // Pipelines & stages
    // ========================================================================

    pub async fn default_pipeline(&self) -> Result<Option<PipelineNode>> {
        Ok(self
            .store
            .list_pipelines()
            .await?
            .into_iter()
            .find(|p| p.is_default))
    }

    /// Ordered stages of the default pipeline, empty when none is configured
    pub async fn default_stages(&self) -> Result<Vec<StageNode>> {
        match self.default_pipeline().await? {
            Some(p) => self.store.list_stages(Some(&p.pipeline_id)).await,
            None => Ok(Vec::new()),
        }
    }

    /// Create a pipeline. The first pipeline always becomes the default.
    pub async fn create_pipeline(&self, req: CreatePipelineRequest) -> Result<PipelineNode> {
        require_non_empty(&req.name, "name")?;
        let is_first = self.store.list_pipelines().await?.is_empty();
        let mut pipeline = PipelineNode {
            pipeline_id: new_id("pipe"),
            name: req.name.trim().to_string(),
            description: req.description,
            is_default: req.is_default || is_first,
            created_at: Utc::now(),
        };

        self.store.create_pipeline(&pipeline).await?;
        if pipeline.is_default {
            self.store.set_default_pipeline(&pipeline.pipeline_id).await?;
            pipeline.is_default = true;
        }
        Ok(pipeline)
    }

    pub async fn update_pipeline(
        &self,
        pipeline_id: &str,
        req: UpdatePipelineRequest,
    ) -> Result<Option<PipelineNode>> {
        let mut pipeline = match self.store.get_pipeline(pipeline_id).await? {
            Some(p) => p,
            None => return Ok(None),
        };

        if req.is_default == Some(false) && pipeline.is_default {
            return Err(invalid(
                "Cannot unset the default pipeline; promote another pipeline instead",
            ));
        }
        if let Some(name) = req.name {
            require_non_empty(&name, "name")?;
            pipeline.name = name.trim().to_string();
        }
        if let Some(v) = req.description {
            pipeline.description = Some(v);
        }

        self.store.update_pipeline(&pipeline).await?;
        if req.is_default == Some(true) && !pipeline.is_default {
            self.store.set_default_pipeline(pipeline_id).await?;
            pipeline.is_default = true;
        }
        Ok(Some(pipeline))
    }

    pub async fn list_stages(&self, pipeline_id: &str) -> Result<Option<Vec<StageNode>>> {
        if self.store.get_pipeline(pipeline_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.store.list_stages(Some(pipeline_id)).await?))
    }

    pub async fn create_stage(
        &self,
        pipeline_id: &str,
        req: CreateStageRequest,
    ) -> Result<StageNode> {
        require_non_empty(&req.name, "name")?;
        if self.store.get_pipeline(pipeline_id).await?.is_none() {
            return Err(not_found("Pipeline"));
        }
        let win_probability = req.win_probability.unwrap_or(0);
        if !(0..=100).contains(&win_probability) {
            return Err(invalid("win_probability must be between 0 and 100"));
        }

        let stage_id = match req.stage_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => {
                if self.store.get_stage(&id).await?.is_some() {
                    return Err(CrmError::Conflict(format!("Stage '{}' already exists", id)).into());
                }
                id
            }
            None => new_id("stage"),
        };
        let order = match req.order {
            Some(order) => order,
            None => self
                .store
                .list_stages(Some(pipeline_id))
                .await?
                .iter()
                .map(|s| s.order)
                .max()
                .unwrap_or(0)
                + 1,
        };
        let name = req.name.trim().to_string();
        let kind = req
            .kind
            .unwrap_or_else(|| StageKind::infer(&stage_id, &name));

        let stage = StageNode {
            stage_id,
            pipeline_id: pipeline_id.to_string(),
            name,
            order,
            win_probability,
            auto_activity: req.auto_activity,
            kind,
            created_at: Utc::now(),
        };
        self.store.create_stage(&stage).await?;
        Ok(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo4j::mock::MockCrmStore;
    use crate::test_helpers::{
        seeded_mock_store, test_activity, test_contact, test_opportunity, test_organization,
    };
    use chrono::Duration;

    fn create_opp_request(org_id: &str, stage_id: Option<&str>) -> CreateOpportunityRequest {
        CreateOpportunityRequest {
            name: "Data platform refresh".into(),
            org_id: org_id.into(),
            primary_contact_id: None,
            engagement_type: Some(EngagementType::DataModernization),
            estimated_value: Some(120_000.0),
            confidence_level: None,
            owner_id: None,
            pipeline_id: None,
            stage_id: stage_id.map(String::from),
            target_close_date: None,
            source: None,
            notes: None,
            value_hypothesis: None,
            deal_start_date: None,
            deal_end_date: None,
            num_consultants: None,
            blended_hourly_rate: None,
            calculated_value: None,
        }
    }

    fn crm_error(err: &anyhow::Error) -> &CrmError {
        err.downcast_ref::<CrmError>().expect("expected a CrmError")
    }

    #[tokio::test]
    async fn test_create_opportunity_defaults() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store.clone());

        let opp = manager
            .create_opportunity(create_opp_request("org_seed", None), "user_actor")
            .await
            .unwrap();

        assert_eq!(opp.pipeline_id, "pipe_default");
        assert_eq!(opp.stage_id, "stage_discovery");
        assert_eq!(opp.owner_id, "user_actor");
        assert_eq!(opp.confidence_level, 50);
        assert_eq!(opp.version, 0);
        assert!(store.get_opportunity(&opp.opp_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_opportunity_validation() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store);

        let err = manager
            .create_opportunity(create_opp_request("org_missing", None), "u")
            .await
            .unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::Validation(_)));

        let mut req = create_opp_request("org_seed", None);
        req.confidence_level = Some(140);
        let err = manager.create_opportunity(req, "u").await.unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::Validation(_)));

        let mut req = create_opp_request("org_seed", None);
        req.estimated_value = Some(-1.0);
        assert!(manager.create_opportunity(req, "u").await.is_err());
    }

    #[tokio::test]
    async fn test_create_into_auto_activity_stage() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store.clone());

        let opp = manager
            .create_opportunity(
                create_opp_request("org_seed", Some("stage_value_hypothesis")),
                "user_actor",
            )
            .await
            .unwrap();

        let activities = store
            .list_activities(&ActivityFilter::for_opportunity(&opp.opp_id))
            .await
            .unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::FollowUp);
        assert_eq!(activities[0].notes.as_deref(), Some("Prepare value narrative"));
        assert_eq!(activities[0].owner_id, "user_actor");
    }

    #[tokio::test]
    async fn test_stage_change_fires_once() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store.clone());
        let opp = manager
            .create_opportunity(create_opp_request("org_seed", None), "u1")
            .await
            .unwrap();
        let entered = opp.stage_entered_at;

        let moved = manager
            .update_opportunity(
                &opp.opp_id,
                UpdateOpportunityRequest {
                    stage_id: Some("stage_value_hypothesis".into()),
                    ..Default::default()
                },
                "u2",
            )
            .await
            .unwrap()
            .unwrap();
        assert!(moved.stage_entered_at >= entered);
        assert_eq!(moved.version, 1);

        // Same stage again: no new automation
        manager
            .update_opportunity(
                &opp.opp_id,
                UpdateOpportunityRequest {
                    stage_id: Some("stage_value_hypothesis".into()),
                    notes: Some(Some("still here".into())),
                    ..Default::default()
                },
                "u2",
            )
            .await
            .unwrap();

        let follow_ups = store
            .list_activities(&ActivityFilter::for_opportunity(&opp.opp_id))
            .await
            .unwrap();
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].owner_id, "u2");
    }

    #[tokio::test]
    async fn test_stage_change_to_won_refreshes_kind() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store);
        let opp = manager
            .create_opportunity(create_opp_request("org_seed", None), "u1")
            .await
            .unwrap();

        let won = manager
            .update_opportunity(
                &opp.opp_id,
                UpdateOpportunityRequest {
                    stage_id: Some("stage_closed_won".into()),
                    ..Default::default()
                },
                "u1",
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(won.stage_kind, StageKind::Won);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store);
        let opp = manager
            .create_opportunity(create_opp_request("org_seed", None), "u1")
            .await
            .unwrap();

        manager
            .update_opportunity(
                &opp.opp_id,
                UpdateOpportunityRequest {
                    name: Some("First writer".into()),
                    version: Some(0),
                    ..Default::default()
                },
                "u1",
            )
            .await
            .unwrap();

        let err = manager
            .update_opportunity(
                &opp.opp_id,
                UpdateOpportunityRequest {
                    name: Some("Second writer".into()),
                    version: Some(0),
                    ..Default::default()
                },
                "u1",
            )
            .await
            .unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_clears_nullable_fields() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store);
        let mut req = create_opp_request("org_seed", None);
        req.num_consultants = Some(4);
        req.blended_hourly_rate = Some(210.0);
        let opp = manager.create_opportunity(req, "u1").await.unwrap();

        let updated = manager
            .update_opportunity(
                &opp.opp_id,
                serde_json::from_str(r#"{"num_consultants": null}"#).unwrap(),
                "u1",
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.num_consultants, None);
        assert_eq!(updated.blended_hourly_rate, Some(210.0));
    }

    #[tokio::test]
    async fn test_at_risk_clear_nulls_reason() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store);
        let opp = manager
            .create_opportunity(create_opp_request("org_seed", None), "u1")
            .await
            .unwrap();

        let flagged = manager
            .set_opportunity_at_risk(
                &opp.opp_id,
                SetAtRiskRequest {
                    is_at_risk: true,
                    at_risk_reason: Some("Sponsor left".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(flagged.is_at_risk);
        assert_eq!(flagged.at_risk_reason.as_deref(), Some("Sponsor left"));

        let cleared = manager
            .set_opportunity_at_risk(
                &opp.opp_id,
                SetAtRiskRequest {
                    is_at_risk: false,
                    at_risk_reason: Some("ignored".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!cleared.is_at_risk);
        assert!(cleared.at_risk_reason.is_none());

        assert!(manager
            .set_opportunity_at_risk(
                "opp_missing",
                SetAtRiskRequest {
                    is_at_risk: true,
                    at_risk_reason: None
                }
            )
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_logging_activity_clears_risk() {
        let mut opp = test_opportunity("opp_r", "org_seed", "u1", "stage_discovery", 10.0, 10);
        opp.is_at_risk = true;
        opp.at_risk_reason = Some("Quiet for weeks".into());
        let store = Arc::new(seeded_mock_store().await.with_opportunity(opp).await);
        let manager = CrmManager::new(store.clone());

        manager
            .create_activity(
                CreateActivityRequest {
                    activity_type: ActivityType::Call,
                    title: None,
                    opp_id: Some("opp_r".into()),
                    org_id: None,
                    due_date: None,
                    owner_id: None,
                    status: None,
                    notes: Some("Re-engaged sponsor".into()),
                },
                "u1",
            )
            .await
            .unwrap();

        let opp = store.get_opportunity("opp_r").await.unwrap().unwrap();
        assert!(!opp.is_at_risk);
        assert!(opp.at_risk_reason.is_none());
    }

    #[tokio::test]
    async fn test_delete_opportunity_cascades() {
        let store = Arc::new(
            MockCrmStore::new()
                .with_opportunity(test_opportunity("opp_1", "org_1", "u1", "s", 1.0, 1))
                .await
                .with_activity(test_activity(Some("opp_1"), None, "u1"))
                .await
                .with_activity(test_activity(Some("opp_1"), None, "u2"))
                .await
                .with_activity(test_activity(None, Some("org_1"), "u1"))
                .await,
        );

        assert!(store.delete_opportunity("opp_1").await.unwrap());
        let remaining = store
            .list_activities(&ActivityFilter::for_opportunity("opp_1"))
            .await
            .unwrap();
        assert!(remaining.is_empty());
        assert_eq!(
            store
                .list_activities(&ActivityFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_single_default_pipeline() {
        let store = Arc::new(MockCrmStore::new());
        let manager = CrmManager::new(store.clone());

        let first = manager
            .create_pipeline(CreatePipelineRequest {
                name: "Advisory".into(),
                description: None,
                is_default: false,
            })
            .await
            .unwrap();
        assert!(first.is_default);

        let second = manager
            .create_pipeline(CreatePipelineRequest {
                name: "Managed services".into(),
                description: None,
                is_default: true,
            })
            .await
            .unwrap();
        assert!(second.is_default);

        let defaults: Vec<_> = store
            .list_pipelines()
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].pipeline_id, second.pipeline_id);

        let err = manager
            .update_pipeline(
                &second.pipeline_id,
                UpdatePipelineRequest {
                    is_default: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_stage_infers_kind_and_order() {
        let store = Arc::new(seeded_mock_store().await);
        let manager = CrmManager::new(store);

        let stage = manager
            .create_stage(
                "pipe_default",
                CreateStageRequest {
                    stage_id: None,
                    name: "Closed Won (renewal)".into(),
                    order: None,
                    win_probability: Some(100),
                    auto_activity: None,
                    kind: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(stage.kind, StageKind::Won);
        assert!(stage.stage_id.starts_with("stage_"));

        let max_order = manager
            .list_stages("pipe_default")
            .await
            .unwrap()
            .unwrap()
            .iter()
            .map(|s| s.order)
            .max()
            .unwrap();
        assert_eq!(stage.order, max_order);

        let err = manager
            .create_stage(
                "pipe_missing",
                CreateStageRequest {
                    stage_id: None,
                    name: "X".into(),
                    order: None,
                    win_probability: None,
                    auto_activity: None,
                    kind: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_organization_notes_and_risk() {
        let mut org = test_organization("org_old", "u1");
        org.created_at = Utc::now() - Duration::days(30);
        let store = Arc::new(MockCrmStore::new().with_organization(org).await);
        let manager = CrmManager::new(store.clone());

        let view = manager.get_organization_view("org_old").await.unwrap().unwrap();
        assert!(view.is_at_risk);

        let err = manager
            .add_organization_note("org_old", "   ", "u1", "Uma")
            .await
            .unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::Validation(_)));

        let err = manager
            .add_organization_note("org_nope", "hello", "u1", "Uma")
            .await
            .unwrap_err();
        assert!(matches!(crm_error(&err), CrmError::NotFound(_)));

        let view = manager
            .add_organization_note("org_old", "Budget cycle starts in Q3", "u1", "Uma")
            .await
            .unwrap();
        assert_eq!(view.organization.notes_history.len(), 1);
        assert_eq!(view.organization.notes_history[0].author_name, "Uma");

        store
            .create_activity(&test_activity(None, Some("org_old"), "u1"))
            .await
            .unwrap();
        let view = manager.get_organization_view("org_old").await.unwrap().unwrap();
        assert!(!view.is_at_risk);
    }

    #[tokio::test]
    async fn test_organization_summary_buyer() {
        let mut champion = test_contact("contact_a", "org_1");
        champion.buying_role = Some(BuyingRole::Champion);
        let mut dm = test_contact("contact_b", "org_1");
        dm.buying_role = Some(BuyingRole::DecisionMaker);
        dm.created_at = champion.created_at + Duration::seconds(1);

        let store = Arc::new(
            MockCrmStore::new()
                .with_organization(test_organization("org_1", "u1"))
                .await
                .with_contact(champion)
                .await
                .with_contact(dm)
                .await
                .with_opportunity(test_opportunity(
                    "o1",
                    "org_1",
                    "u1",
                    "stage_closed_won",
                    100.0,
                    90,
                ))
                .await
                .with_opportunity(test_opportunity(
                    "o2",
                    "org_1",
                    "u1",
                    "stage_discovery",
                    50.0,
                    20,
                ))
                .await,
        );
        let manager = CrmManager::new(store);

        let summary = manager.organization_summary("org_1").await.unwrap().unwrap();
        assert_eq!(summary.buyer.unwrap().contact_id, "contact_b");
        assert_eq!(summary.opportunities.won_count, 1);
        assert_eq!(summary.opportunities.pipeline_value, 50.0);
        assert_eq!(summary.active_opportunities.len(), 1);
        assert_eq!(summary.pipeline_opportunities.len(), 1);

        assert!(manager.organization_summary("org_x").await.unwrap().is_none());
    }
}
