//! Stage entry side effects.
//!
//! Runs when an opportunity is created, and when an update moves it to a
//! different stage. The caller persists the returned follow-up activity.

use crate::neo4j::models::{
    new_id, ActivityNode, ActivityStatus, ActivityType, OpportunityNode, StageKind, StageNode,
};
use chrono::{DateTime, Duration, Utc};

/// Days until an automatic follow-up is due
pub const FOLLOW_UP_DUE_DAYS: i64 = 3;

/// True when an update from `previous` to `next` is a stage change.
pub fn is_stage_change(previous: &str, next: &str) -> bool {
    previous != next
}

/// Record entry into `opp.stage_id`.
///
/// Resets `stage_entered_at` (never moving it backwards) and refreshes
/// `stage_kind`. When `stage` is missing the kind falls back to the id
/// convention and no follow-up is produced.
pub fn enter_stage(
    opp: &mut OpportunityNode,
    stage: Option<&StageNode>,
    acting_user_id: &str,
    now: DateTime<Utc>,
) -> Option<ActivityNode> {
    opp.stage_entered_at = opp.stage_entered_at.max(now);
    opp.stage_kind = stage
        .map(|s| s.kind)
        .unwrap_or_else(|| StageKind::from_stage_id(&opp.stage_id));

    let stage = stage?;
    let template = stage.auto_activity_template()?;

    Some(ActivityNode {
        activity_id: new_id("act"),
        activity_type: ActivityType::FollowUp,
        title: Some(format!("Follow-up: {}", stage.name)),
        opp_id: Some(opp.opp_id.clone()),
        org_id: None,
        due_date: Some((now + Duration::days(FOLLOW_UP_DUE_DAYS)).to_rfc3339()),
        owner_id: acting_user_id.to_string(),
        status: ActivityStatus::Planned,
        notes: Some(template.to_string()),
        created_at: now,
        updated_at: now,
    })
}
