//! Portfolio rollups over opportunity collections.
//!
//! Everything here is a pure function over slices already loaded from the
//! store. Callers narrow the input with [`Scope`] first; none of the
//! aggregations branch on who is asking.

use super::risk::count_overdue;
use crate::neo4j::models::{ActivityNode, OpportunityNode, StageKind, StageNode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Bucket key for opportunities with no stage or owner
pub const UNKNOWN_KEY: &str = "unknown";
/// Bucket key for opportunities with no engagement type
pub const UNKNOWN_ENGAGEMENT: &str = "Unknown";
/// Display name for owners missing from the user map
pub const UNKNOWN_OWNER_NAME: &str = "Unknown";

// ============================================================================
// Scalar metrics
// ============================================================================

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage of closed deals that were won, one decimal. 0.0 with nothing closed.
pub fn win_rate(won: usize, lost: usize) -> f64 {
    round1(won as f64 / (won + lost).max(1) as f64 * 100.0)
}

pub fn total_value<'a>(opps: impl IntoIterator<Item = &'a OpportunityNode>) -> f64 {
    opps.into_iter().map(|o| o.estimated_value).sum()
}

pub fn weighted_forecast<'a>(opps: impl IntoIterator<Item = &'a OpportunityNode>) -> f64 {
    opps.into_iter().map(OpportunityNode::weighted_value).sum()
}

pub fn average_deal_size(opps: &[OpportunityNode]) -> f64 {
    total_value(opps) / opps.len().max(1) as f64
}

// ============================================================================
// Categorization
// ============================================================================

/// Won / lost / open partition of a collection
#[derive(Debug, Default)]
pub struct Categorized<'a> {
    pub won: Vec<&'a OpportunityNode>,
    pub lost: Vec<&'a OpportunityNode>,
    pub open: Vec<&'a OpportunityNode>,
}

pub fn categorize(opps: &[OpportunityNode]) -> Categorized<'_> {
    let mut categorized = Categorized::default();
    for opp in opps {
        match opp.stage_kind {
            StageKind::Won => categorized.won.push(opp),
            StageKind::Lost => categorized.lost.push(opp),
            StageKind::Open => categorized.open.push(opp),
        }
    }
    categorized
}

// ============================================================================
// Grouped rollups
// ============================================================================

/// Aggregate for one group key
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Bucket {
    pub key: String,
    pub count: usize,
    pub total_value: f64,
    pub weighted_value: f64,
    pub won_count: usize,
    pub lost_count: usize,
    pub win_rate: f64,
}

impl Bucket {
    fn new(key: String) -> Self {
        Self {
            key,
            count: 0,
            total_value: 0.0,
            weighted_value: 0.0,
            won_count: 0,
            lost_count: 0,
            win_rate: 0.0,
        }
    }

    fn add(&mut self, opp: &OpportunityNode) {
        self.count += 1;
        self.total_value += opp.estimated_value;
        self.weighted_value += opp.weighted_value();
        match opp.stage_kind {
            StageKind::Won => self.won_count += 1,
            StageKind::Lost => self.lost_count += 1,
            StageKind::Open => {}
        }
        self.win_rate = win_rate(self.won_count, self.lost_count);
    }
}

fn key_or(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Group opportunities by `key`, keeping buckets in first-seen order.
pub fn group_by<'a, F>(opps: impl IntoIterator<Item = &'a OpportunityNode>, key: F) -> Vec<Bucket>
where
    F: Fn(&OpportunityNode) -> String,
{
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for opp in opps {
        let k = key(opp);
        let slot = match index.get(&k) {
            Some(&i) => i,
            None => {
                index.insert(k.clone(), buckets.len());
                buckets.push(Bucket::new(k));
                buckets.len() - 1
            }
        };
        buckets[slot].add(opp);
    }

    buckets
}

pub fn by_stage(opps: &[OpportunityNode]) -> Vec<Bucket> {
    group_by(opps, |o| key_or(Some(o.stage_id.as_str()), UNKNOWN_KEY))
}

pub fn by_engagement_type(opps: &[OpportunityNode]) -> Vec<Bucket> {
    group_by(opps, |o| {
        key_or(o.engagement_type.map(|e| e.label()), UNKNOWN_ENGAGEMENT)
    })
}

/// Owner bucket with a resolved display name
#[derive(Debug, Clone, Serialize)]
pub struct OwnerRollup {
    pub owner_name: String,
    #[serde(flatten)]
    pub bucket: Bucket,
}

/// Group by owner, resolve names through `names`, and sort by descending
/// total value. Ties keep first-seen order.
pub fn by_owner(opps: &[OpportunityNode], names: &HashMap<String, String>) -> Vec<OwnerRollup> {
    let buckets = group_by(opps, |o| key_or(Some(o.owner_id.as_str()), UNKNOWN_KEY));
    let mut rollups: Vec<OwnerRollup> = buckets
        .into_iter()
        .map(|bucket| OwnerRollup {
            owner_name: names
                .get(&bucket.key)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_OWNER_NAME.to_string()),
            bucket,
        })
        .collect();

    rollups.sort_by(|a, b| b.bucket.total_value.total_cmp(&a.bucket.total_value));
    rollups
}

// ============================================================================
// Scope
// ============================================================================

/// Which slice of the portfolio a view aggregates over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Mine(String),
}

impl Scope {
    pub fn from_owner(owner_id: Option<String>) -> Self {
        match owner_id {
            Some(id) if !id.is_empty() => Scope::Mine(id),
            _ => Scope::All,
        }
    }
}

/// Narrow opportunities and activities to `scope`.
///
/// `Mine(user)` keeps the user's opportunities, the activities on those
/// opportunities, and the user's own activities that are not tied to any
/// opportunity.
pub fn apply_scope(
    scope: &Scope,
    opps: Vec<OpportunityNode>,
    activities: Vec<ActivityNode>,
) -> (Vec<OpportunityNode>, Vec<ActivityNode>) {
    let user_id = match scope {
        Scope::All => return (opps, activities),
        Scope::Mine(user_id) => user_id,
    };

    let opps: Vec<OpportunityNode> = opps
        .into_iter()
        .filter(|o| &o.owner_id == user_id)
        .collect();
    let opp_ids: HashSet<&str> = opps.iter().map(|o| o.opp_id.as_str()).collect();

    let activities = activities
        .into_iter()
        .filter(|a| match a.opp_id.as_deref() {
            Some(opp_id) => opp_ids.contains(opp_id),
            None => &a.owner_id == user_id,
        })
        .collect();

    (opps, activities)
}

// ============================================================================
// View aggregates
// ============================================================================

/// Headline numbers for the sales and my-pipeline dashboards
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_opportunities: usize,
    pub total_value: f64,
    pub weighted_forecast: f64,
    pub overdue_activities: usize,
    pub at_risk_opportunities: usize,
}

pub fn dashboard_metrics(
    opps: &[OpportunityNode],
    activities: &[ActivityNode],
    now: DateTime<Utc>,
) -> DashboardMetrics {
    DashboardMetrics {
        total_opportunities: opps.len(),
        total_value: total_value(opps),
        weighted_forecast: weighted_forecast(opps),
        overdue_activities: count_overdue(activities, now),
        at_risk_opportunities: opps.iter().filter(|o| o.is_at_risk).count(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveMetrics {
    pub total_pipeline_value: f64,
    pub weighted_forecast: f64,
    pub total_deals: usize,
    pub won_deals: usize,
    pub lost_deals: usize,
    pub win_rate: f64,
}

pub fn executive_metrics(opps: &[OpportunityNode]) -> ExecutiveMetrics {
    let c = categorize(opps);
    ExecutiveMetrics {
        total_pipeline_value: total_value(opps),
        weighted_forecast: weighted_forecast(opps),
        total_deals: opps.len(),
        won_deals: c.won.len(),
        lost_deals: c.lost.len(),
        win_rate: win_rate(c.won.len(), c.lost.len()),
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct CountValue {
    pub count: usize,
    pub value: f64,
}

impl CountValue {
    fn of<'a>(opps: impl IntoIterator<Item = &'a OpportunityNode>) -> Self {
        opps.into_iter().fold(Self::default(), |acc, o| Self {
            count: acc.count + 1,
            value: acc.value + o.estimated_value,
        })
    }
}

/// Collapse buckets into a `{key: {count, value}}` map
pub fn count_value_map(buckets: &[Bucket]) -> BTreeMap<String, CountValue> {
    buckets
        .iter()
        .map(|b| {
            (
                b.key.clone(),
                CountValue {
                    count: b.count,
                    value: b.total_value,
                },
            )
        })
        .collect()
}

/// Row of the pipeline-by-stage analytics view
#[derive(Debug, Clone, Serialize)]
pub struct StageRow {
    pub stage: String,
    pub stage_id: String,
    pub count: usize,
    pub value: f64,
    pub weighted: f64,
}

/// One row per catalog stage in order (empty stages included), then any
/// buckets whose stage id is not in the catalog.
pub fn pipeline_by_stage(stages: &[StageNode], opps: &[OpportunityNode]) -> Vec<StageRow> {
    let grouped = by_stage(opps);
    let first_seen: Vec<String> = grouped.iter().map(|b| b.key.clone()).collect();
    let mut buckets: HashMap<String, Bucket> =
        grouped.into_iter().map(|b| (b.key.clone(), b)).collect();

    let mut rows: Vec<StageRow> = stages
        .iter()
        .map(|stage| {
            let bucket = buckets.remove(&stage.stage_id);
            StageRow {
                stage: stage.name.clone(),
                stage_id: stage.stage_id.clone(),
                count: bucket.as_ref().map_or(0, |b| b.count),
                value: bucket.as_ref().map_or(0.0, |b| b.total_value),
                weighted: bucket.as_ref().map_or(0.0, |b| b.weighted_value),
            }
        })
        .collect();

    for key in first_seen {
        if let Some(bucket) = buckets.remove(&key) {
            rows.push(StageRow {
                stage: bucket.key.clone(),
                stage_id: bucket.key,
                count: bucket.count,
                value: bucket.total_value,
                weighted: bucket.weighted_value,
            });
        }
    }

    rows
}

/// Row of the engagement-type analytics view
#[derive(Debug, Clone, Serialize)]
pub struct EngagementRow {
    #[serde(rename = "type")]
    pub engagement_type: String,
    pub total: usize,
    pub won: usize,
    pub lost: usize,
    pub value: f64,
    pub weighted: f64,
    pub win_rate: f64,
}

impl From<Bucket> for EngagementRow {
    fn from(b: Bucket) -> Self {
        Self {
            engagement_type: b.key,
            total: b.count,
            won: b.won_count,
            lost: b.lost_count,
            value: b.total_value,
            weighted: b.weighted_value,
            win_rate: b.win_rate,
        }
    }
}

/// Row of the by-owner analytics view
#[derive(Debug, Clone, Serialize)]
pub struct OwnerRow {
    pub owner_id: String,
    pub owner_name: String,
    pub total: usize,
    pub value: f64,
    pub weighted: f64,
    pub won: usize,
    pub lost: usize,
    pub win_rate: f64,
}

impl From<OwnerRollup> for OwnerRow {
    fn from(r: OwnerRollup) -> Self {
        Self {
            owner_id: r.bucket.key,
            owner_name: r.owner_name,
            total: r.bucket.count,
            value: r.bucket.total_value,
            weighted: r.bucket.weighted_value,
            won: r.bucket.won_count,
            lost: r.bucket.lost_count,
            win_rate: r.bucket.win_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub total_deals: usize,
    pub active_deals: usize,
    pub won_deals: usize,
    pub lost_deals: usize,
    pub total_pipeline_value: f64,
    pub weighted_forecast: f64,
    pub win_rate: f64,
    pub average_deal_size: f64,
    pub at_risk_deals: usize,
    pub overdue_activities: usize,
}

pub fn summarize(
    opps: &[OpportunityNode],
    activities: &[ActivityNode],
    now: DateTime<Utc>,
) -> PipelineSummary {
    let c = categorize(opps);
    PipelineSummary {
        total_deals: opps.len(),
        active_deals: c.open.len(),
        won_deals: c.won.len(),
        lost_deals: c.lost.len(),
        total_pipeline_value: total_value(opps),
        weighted_forecast: weighted_forecast(opps),
        win_rate: win_rate(c.won.len(), c.lost.len()),
        average_deal_size: average_deal_size(opps),
        at_risk_deals: opps.iter().filter(|o| o.is_at_risk).count(),
        overdue_activities: count_overdue(activities, now),
    }
}

/// Portfolio report. `active` mirrors `won`: engagements under delivery are the won deals.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub won: CountValue,
    pub lost: CountValue,
    pub active: CountValue,
    pub pipeline: CountValue,
    pub total: CountValue,
}

pub fn report_summary(opps: &[OpportunityNode]) -> ReportSummary {
    let c = categorize(opps);
    let won = CountValue::of(c.won.iter().copied());
    ReportSummary {
        won,
        lost: CountValue::of(c.lost.iter().copied()),
        active: won,
        pipeline: CountValue::of(c.open.iter().copied()),
        total: CountValue::of(opps),
    }
}

/// Per-organization deal statistics
#[derive(Debug, Clone, Serialize)]
pub struct OrgOpportunityStats {
    pub count: usize,
    pub total_value: f64,
    pub avg_confidence: f64,
    pub won_count: usize,
    pub won_value: f64,
    pub lost_count: usize,
    pub lost_value: f64,
    pub pipeline_count: usize,
    pub pipeline_value: f64,
}

pub fn org_opportunity_stats(opps: &[OpportunityNode]) -> OrgOpportunityStats {
    let c = categorize(opps);
    let confidence_sum: i64 = opps.iter().map(|o| i64::from(o.confidence_level)).sum();
    OrgOpportunityStats {
        count: opps.len(),
        total_value: total_value(opps),
        avg_confidence: round1(confidence_sum as f64 / opps.len().max(1) as f64),
        won_count: c.won.len(),
        won_value: total_value(c.won.iter().copied()),
        lost_count: c.lost.len(),
        lost_value: total_value(c.lost.iter().copied()),
        pipeline_count: c.open.len(),
        pipeline_value: total_value(c.open.iter().copied()),
    }
}
