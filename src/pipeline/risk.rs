//! Risk signals derived from activity recency and due dates.
//!
//! An organization is at risk when it is past its grace period and none of its
//! activities (direct, or via its opportunities) fall inside the recency window.
//! Activity due dates are stored as free text, so everything here parses them
//! leniently.

use crate::neo4j::models::{ActivityNode, ActivityStatus, OpportunityNode, OrganizationNode};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Recency window and new-organization grace period, in days
pub const RISK_WINDOW_DAYS: i64 = 7;

/// 2000-01-01T00:00:00Z, used for due dates that are present but unparseable
const MALFORMED_DUE_DATE_TS: i64 = 946_684_800;

/// Parse a timestamp in any of the shapes clients send: RFC 3339, a naive
/// datetime (assumed UTC), or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn malformed_due_date() -> DateTime<Utc> {
    DateTime::from_timestamp(MALFORMED_DUE_DATE_TS, 0).unwrap_or_default()
}

fn due_date_text(activity: &ActivityNode) -> Option<&str> {
    activity
        .due_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
}

/// Date an activity counts for when judging recency.
///
/// Parsed due date when present, the year-2000 sentinel when present but
/// malformed, otherwise `created_at`.
pub fn effective_activity_date(activity: &ActivityNode) -> DateTime<Utc> {
    match due_date_text(activity) {
        Some(raw) => parse_timestamp(raw).unwrap_or_else(malformed_due_date),
        None => activity.created_at,
    }
}

fn at_risk_from_latest(
    org_created_at: DateTime<Utc>,
    latest_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let cutoff = now - Duration::days(RISK_WINDOW_DAYS);
    let recent = latest_activity.is_some_and(|d| d >= cutoff);
    !recent && org_created_at < cutoff
}

/// Whether an organization is at risk given its relevant activities.
pub fn org_is_at_risk<'a>(
    org_created_at: DateTime<Utc>,
    activities: impl IntoIterator<Item = &'a ActivityNode>,
    now: DateTime<Utc>,
) -> bool {
    let latest = activities.into_iter().map(effective_activity_date).max();
    at_risk_from_latest(org_created_at, latest, now)
}

/// Activities linked to an organization directly or through one of its opportunities.
pub fn relevant_activities<'a>(
    org_id: &str,
    opportunities: &[OpportunityNode],
    activities: &'a [ActivityNode],
) -> Vec<&'a ActivityNode> {
    let opp_ids: HashSet<&str> = opportunities
        .iter()
        .filter(|o| o.org_id == org_id)
        .map(|o| o.opp_id.as_str())
        .collect();

    activities
        .iter()
        .filter(|a| {
            a.org_id.as_deref() == Some(org_id)
                || a.opp_id
                    .as_deref()
                    .is_some_and(|opp_id| opp_ids.contains(opp_id))
        })
        .collect()
}

/// At-risk flag for every organization, in one pass over the activities.
pub fn at_risk_by_org(
    organizations: &[OrganizationNode],
    opportunities: &[OpportunityNode],
    activities: &[ActivityNode],
    now: DateTime<Utc>,
) -> HashMap<String, bool> {
    let opp_org: HashMap<&str, &str> = opportunities
        .iter()
        .map(|o| (o.opp_id.as_str(), o.org_id.as_str()))
        .collect();

    let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for activity in activities {
        let date = effective_activity_date(activity);
        let direct = activity.org_id.as_deref();
        let via_opp = activity
            .opp_id
            .as_deref()
            .and_then(|opp_id| opp_org.get(opp_id).copied());

        for org_id in [direct, via_opp].into_iter().flatten() {
            latest
                .entry(org_id)
                .and_modify(|d| *d = (*d).max(date))
                .or_insert(date);
        }
    }

    organizations
        .iter()
        .map(|org| {
            let at_risk = at_risk_from_latest(
                org.created_at,
                latest.get(org.org_id.as_str()).copied(),
                now,
            );
            (org.org_id.clone(), at_risk)
        })
        .collect()
}

/// Planned and due strictly before `now`. Missing or malformed due dates never qualify.
pub fn is_overdue(activity: &ActivityNode, now: DateTime<Utc>) -> bool {
    activity.status == ActivityStatus::Planned
        && due_date_text(activity)
            .and_then(parse_timestamp)
            .is_some_and(|due| due < now)
}

pub fn count_overdue(activities: &[ActivityNode], now: DateTime<Utc>) -> usize {
    activities.iter().filter(|a| is_overdue(a, now)).count()
}
