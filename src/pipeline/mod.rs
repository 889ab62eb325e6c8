//! Pipeline engine
//!
//! Pure computations over loaded entities:
//! - [`risk`]: organization at-risk signal and overdue detection
//! - [`rollup`]: categorization, metrics, grouped rollups and scoping
//! - [`transition`]: stage entry side effects

pub mod risk;
pub mod rollup;
pub mod transition;

pub use risk::{at_risk_by_org, is_overdue, org_is_at_risk, parse_timestamp, relevant_activities};
pub use rollup::{apply_scope, categorize, Bucket, Scope};
pub use transition::enter_stage;
