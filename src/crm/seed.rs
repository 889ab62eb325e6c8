//! Demo data set: the default consulting pipeline plus a handful of
//! accounts, deals and activities to explore the dashboards with.

use crate::neo4j::models::*;
use crate::neo4j::CrmStore;
use crate::pipeline::transition::enter_stage;
use anyhow::Result;
use chrono::{Duration, Utc};

pub const DEFAULT_PIPELINE_ID: &str = "pipe_default";

/// Result of a seeding attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded {
        organizations: usize,
        opportunities: usize,
        activities: usize,
    },
    /// A pipeline already exists; nothing was written
    AlreadySeeded,
}

pub fn default_pipeline() -> PipelineNode {
    PipelineNode {
        pipeline_id: DEFAULT_PIPELINE_ID.to_string(),
        name: "Consulting Sales Pipeline".to_string(),
        description: Some("Advisory and delivery engagements from first call to signature".into()),
        is_default: true,
        created_at: Utc::now(),
    }
}

/// Stage catalog of the default pipeline, in order
pub fn default_stages() -> Vec<StageNode> {
    let catalog: [(&str, &str, i32, Option<&str>); 8] = [
        ("stage_discovery", "Discovery", 10, None),
        (
            "stage_problem_framing",
            "Problem Framing",
            20,
            Some("Schedule discovery workshop"),
        ),
        (
            "stage_value_hypothesis",
            "Value Hypothesis Defined",
            40,
            Some("Prepare value narrative"),
        ),
        (
            "stage_solution_aligned",
            "Solution Direction Aligned",
            60,
            Some("Draft solution approach"),
        ),
        (
            "stage_commercials",
            "Commercials & Scope",
            75,
            Some("Draft SOW outline"),
        ),
        ("stage_sow", "SOW in Progress", 90, Some("Finalize SOW terms")),
        ("stage_closed_won", "Closed Won", 100, None),
        ("stage_closed_lost", "Closed Lost", 0, None),
    ];

    let now = Utc::now();
    catalog
        .iter()
        .zip(1..)
        .map(|(&(id, name, win_probability, auto), order)| StageNode {
            stage_id: id.to_string(),
            pipeline_id: DEFAULT_PIPELINE_ID.to_string(),
            name: name.to_string(),
            order,
            win_probability,
            auto_activity: auto.map(String::from),
            kind: StageKind::infer(id, name),
            created_at: now,
        })
        .collect()
}

struct DemoAccount {
    name: &'static str,
    industry: &'static str,
    region: &'static str,
    tier: StrategicTier,
    contact: (&'static str, &'static str, BuyingRole),
    deal: (&'static str, EngagementType, f64, i32, &'static str),
}

const DEMO_ACCOUNTS: [DemoAccount; 4] = [
    DemoAccount {
        name: "Northwind Logistics",
        industry: "Transportation",
        region: "Midwest",
        tier: StrategicTier::Strategic,
        contact: ("Priya Raman", "VP Data & Analytics", BuyingRole::DecisionMaker),
        deal: (
            "Freight demand forecasting",
            EngagementType::AiEnablement,
            240_000.0,
            60,
            "stage_solution_aligned",
        ),
    },
    DemoAccount {
        name: "Lakeshore Credit Union",
        industry: "Financial Services",
        region: "Great Lakes",
        tier: StrategicTier::Active,
        contact: ("Marcus Oyelaran", "CIO", BuyingRole::Champion),
        deal: (
            "Core data warehouse migration",
            EngagementType::DataModernization,
            410_000.0,
            75,
            "stage_commercials",
        ),
    },
    DemoAccount {
        name: "Cedar Ridge Health",
        industry: "Healthcare",
        region: "Southeast",
        tier: StrategicTier::Target,
        contact: ("Dana Whitfield", "Director of Operations", BuyingRole::Influencer),
        deal: (
            "Operating model assessment",
            EngagementType::Advisory,
            85_000.0,
            100,
            "stage_closed_won",
        ),
    },
    DemoAccount {
        name: "Ironbridge Manufacturing",
        industry: "Manufacturing",
        region: "Northeast",
        tier: StrategicTier::Active,
        contact: ("Tomás Herrera", "COO", BuyingRole::DecisionMaker),
        deal: (
            "Plant floor platform architecture",
            EngagementType::PlatformArchitecture,
            150_000.0,
            10,
            "stage_closed_lost",
        ),
    },
];

/// Seed the demo data set once. A store with any pipeline is left untouched.
pub async fn seed_demo_data(store: &dyn CrmStore, owner_id: &str) -> Result<SeedOutcome> {
    if !store.list_pipelines().await?.is_empty() {
        tracing::info!("Pipelines already present, skipping seed");
        return Ok(SeedOutcome::AlreadySeeded);
    }

    let pipeline = default_pipeline();
    store.create_pipeline(&pipeline).await?;
    store.set_default_pipeline(&pipeline.pipeline_id).await?;

    let stages = default_stages();
    for stage in &stages {
        store.create_stage(stage).await?;
    }

    let now = Utc::now();
    let mut activities = 0;

    for (i, account) in DEMO_ACCOUNTS.iter().enumerate() {
        let created_at = now - Duration::days(30 + i as i64 * 5);
        let org = OrganizationNode {
            org_id: new_id("org"),
            name: account.name.to_string(),
            industry: Some(account.industry.to_string()),
            company_size: None,
            region: Some(account.region.to_string()),
            strategic_tier: account.tier,
            primary_exec_sponsor: Some(account.contact.0.to_string()),
            notes: None,
            notes_history: Vec::new(),
            google_drive_link: None,
            owner_id: owner_id.to_string(),
            created_by: owner_id.to_string(),
            created_at,
            updated_at: created_at,
        };
        store.create_organization(&org).await?;

        let (contact_name, title, role) = account.contact;
        let contact = ContactNode {
            contact_id: new_id("contact"),
            name: contact_name.to_string(),
            title: Some(title.to_string()),
            function: None,
            email: None,
            phone: None,
            buying_role: Some(role),
            org_id: org.org_id.clone(),
            notes: None,
            owner_id: owner_id.to_string(),
            created_by: owner_id.to_string(),
            created_at,
            updated_at: created_at,
        };
        store.create_contact(&contact).await?;

        let (deal_name, engagement, value, confidence, stage_id) = account.deal;
        let mut opp = OpportunityNode {
            opp_id: new_id("opp"),
            name: deal_name.to_string(),
            org_id: org.org_id.clone(),
            primary_contact_id: Some(contact.contact_id.clone()),
            engagement_type: Some(engagement),
            estimated_value: value,
            confidence_level: confidence,
            owner_id: owner_id.to_string(),
            pipeline_id: pipeline.pipeline_id.clone(),
            stage_id: stage_id.to_string(),
            stage_kind: StageKind::Open,
            target_close_date: Some((now + Duration::days(45)).format("%Y-%m-%d").to_string()),
            source: Some(OpportunitySource::Referral),
            notes: None,
            value_hypothesis: None,
            is_at_risk: false,
            at_risk_reason: None,
            deal_start_date: None,
            deal_end_date: None,
            num_consultants: None,
            blended_hourly_rate: None,
            calculated_value: None,
            created_at,
            updated_at: created_at,
            stage_entered_at: created_at,
            version: 0,
        };
        let stage = stages.iter().find(|s| s.stage_id == stage_id);
        // Demo history: no automatic follow-ups
        let _ = enter_stage(&mut opp, stage, owner_id, created_at);
        store.create_opportunity(&opp).await?;

        // The last account is left quiet so the at-risk signal shows up
        if i + 1 < DEMO_ACCOUNTS.len() {
            let activity = ActivityNode {
                activity_id: new_id("act"),
                activity_type: ActivityType::Meeting,
                title: Some(format!("Working session with {}", contact_name)),
                opp_id: Some(opp.opp_id.clone()),
                org_id: Some(org.org_id.clone()),
                due_date: Some((now + Duration::days(i as i64 + 2)).to_rfc3339()),
                owner_id: owner_id.to_string(),
                status: ActivityStatus::Planned,
                notes: None,
                created_at: now,
                updated_at: now,
            };
            store.create_activity(&activity).await?;
            activities += 1;
        }
    }

    tracing::info!(
        organizations = DEMO_ACCOUNTS.len(),
        activities,
        "Seeded demo data"
    );

    Ok(SeedOutcome::Seeded {
        organizations: DEMO_ACCOUNTS.len(),
        opportunities: DEMO_ACCOUNTS.len(),
        activities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo4j::mock::MockCrmStore;

    #[test]
    fn test_default_stages_catalog() {
        let stages = default_stages();
        assert_eq!(stages.len(), 8);
        assert!(stages.windows(2).all(|w| w[0].order < w[1].order));

        let value = stages
            .iter()
            .find(|s| s.name == "Value Hypothesis Defined")
            .unwrap();
        assert_eq!(value.auto_activity_template(), Some("Prepare value narrative"));

        let kinds: Vec<StageKind> = stages.iter().map(|s| s.kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::Won).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::Lost).count(), 1);
    }

    #[tokio::test]
    async fn test_seed_runs_once() {
        let store = MockCrmStore::new();

        let first = seed_demo_data(&store, "user_admin").await.unwrap();
        assert!(matches!(first, SeedOutcome::Seeded { organizations: 4, .. }));

        let pipelines = store.list_pipelines().await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert!(pipelines[0].is_default);

        let opps = store
            .list_opportunities(&OpportunityFilter::default())
            .await
            .unwrap();
        assert_eq!(opps.iter().filter(|o| o.stage_kind == StageKind::Won).count(), 1);
        assert_eq!(opps.iter().filter(|o| o.stage_kind == StageKind::Lost).count(), 1);

        let second = seed_demo_data(&store, "user_admin").await.unwrap();
        assert_eq!(second, SeedOutcome::AlreadySeeded);
        assert_eq!(store.list_organizations().await.unwrap().len(), 4);
    }
}
