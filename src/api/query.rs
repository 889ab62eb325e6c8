//! Query parameter structs for list, dashboard and analytics endpoints

use crate::neo4j::models::{ActivityFilter, ActivityStatus, OpportunityFilter};
use crate::pipeline::Scope;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Query strings arrive as text; empty values count as absent.
fn deserialize_option_from_str<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    use serde::de::Error;
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if !s.is_empty() => s.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `GET /api/contacts?org_id=`
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ContactsQuery {
    pub org_id: Option<String>,
}

impl ContactsQuery {
    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// `GET /api/opportunities?pipeline_id=&owner_id=&org_id=`
#[derive(Debug, Deserialize, Default, Clone)]
pub struct OpportunitiesQuery {
    pub pipeline_id: Option<String>,
    pub owner_id: Option<String>,
    pub org_id: Option<String>,
}

impl From<OpportunitiesQuery> for OpportunityFilter {
    fn from(q: OpportunitiesQuery) -> Self {
        Self {
            pipeline_id: non_empty(q.pipeline_id),
            owner_id: non_empty(q.owner_id),
            org_id: non_empty(q.org_id),
        }
    }
}

/// `GET /api/activities?opp_id=&org_id=&owner_id=&status=`
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ActivitiesQuery {
    pub opp_id: Option<String>,
    pub org_id: Option<String>,
    pub owner_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_option_from_str")]
    pub status: Option<ActivityStatus>,
}

impl From<ActivitiesQuery> for ActivityFilter {
    fn from(q: ActivitiesQuery) -> Self {
        Self {
            opp_id: non_empty(q.opp_id),
            org_id: non_empty(q.org_id),
            owner_id: non_empty(q.owner_id),
            status: q.status,
        }
    }
}

/// `?owner_id=` on analytics endpoints
#[derive(Debug, Deserialize, Default, Clone)]
pub struct OwnerScopeQuery {
    pub owner_id: Option<String>,
}

impl OwnerScopeQuery {
    pub fn scope(&self) -> Scope {
        Scope::from_owner(non_empty(self.owner_id.clone()))
    }
}
