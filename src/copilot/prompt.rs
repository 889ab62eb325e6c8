//! Copilot prompt construction
//!
//! Renders an opportunity snapshot into a fixed context block and wraps it
//! in one of four task templates.

use crate::neo4j::models::{ContactNode, OpportunityNode, OrganizationNode};
use std::fmt;
use std::str::FromStr;

/// System message sent with every copilot request
pub const SYSTEM_PROMPT: &str = "You are a senior sales advisor to a consulting firm that \
delivers technology, data and AI engagements. Give short, specific guidance that an \
executive can act on.";

const MISSING: &str = "None";

/// Task the copilot is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopilotAction {
    Summarize,
    SuggestActivity,
    DraftEmail,
    ValueHypothesis,
}

impl CopilotAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopilotAction::Summarize => "summarize",
            CopilotAction::SuggestActivity => "suggest_activity",
            CopilotAction::DraftEmail => "draft_email",
            CopilotAction::ValueHypothesis => "value_hypothesis",
        }
    }
}

impl fmt::Display for CopilotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CopilotAction {
    type Err = super::CopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(CopilotAction::Summarize),
            "suggest_activity" => Ok(CopilotAction::SuggestActivity),
            "draft_email" => Ok(CopilotAction::DraftEmail),
            "value_hypothesis" => Ok(CopilotAction::ValueHypothesis),
            other => Err(super::CopilotError::UnknownAction(other.to_string())),
        }
    }
}

/// Everything the copilot is allowed to see about one opportunity
#[derive(Debug, Clone)]
pub struct OpportunitySnapshot {
    pub opportunity: OpportunityNode,
    pub organization: Option<OrganizationNode>,
    pub contact: Option<ContactNode>,
    pub activity_count: usize,
    pub extra_context: Option<String>,
}

/// `1234567.8` -> `$1,234,568`
pub fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn or_missing(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(MISSING)
}

/// Render the ten-line context block
pub fn build_context(snapshot: &OpportunitySnapshot) -> String {
    let opp = &snapshot.opportunity;
    let organization = snapshot
        .organization
        .as_ref()
        .map(|o| o.name.as_str())
        .unwrap_or("Unknown");
    let contact = match &snapshot.contact {
        Some(c) => match c.title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => format!("{} ({})", c.name, title),
            None => c.name.clone(),
        },
        None => MISSING.to_string(),
    };

    let lines = [
        format!("Opportunity: {}", opp.name),
        format!("Organization: {}", organization),
        format!(
            "Engagement Type: {}",
            opp.engagement_type.map(|e| e.label()).unwrap_or(MISSING)
        ),
        format!("Estimated Value: {}", format_currency(opp.estimated_value)),
        format!("Confidence: {}%", opp.confidence_level),
        format!("Notes: {}", or_missing(opp.notes.as_deref())),
        format!(
            "Value Hypothesis: {}",
            or_missing(opp.value_hypothesis.as_deref())
        ),
        format!("Contact: {}", contact),
        format!("Recent Activities: {} activities logged", snapshot.activity_count),
        format!(
            "Additional Context: {}",
            or_missing(snapshot.extra_context.as_deref())
        ),
    ];
    lines.join("\n")
}

/// Wrap the context block in the task template for `action`
pub fn render_prompt(action: CopilotAction, context: &str) -> String {
    match action {
        CopilotAction::Summarize => format!(
            "Brief a busy executive on this opportunity: the facts that matter, \
where it stands, and what deserves attention.\n\n{}\n\n\
Answer with an executive summary of 3-4 sentences.",
            context
        ),
        CopilotAction::SuggestActivity => format!(
            "Given where this opportunity stands, recommend the single next activity \
most likely to move it forward.\n\n{}\n\n\
Name ONE concrete step and give a one-line rationale. Be specific about who and what, \
for example \"Book a budget review with the CFO\" rather than \"Follow up\".",
            context
        ),
        CopilotAction::DraftEmail => format!(
            "Draft a follow-up email to the client for this opportunity.\n\n{}\n\n\
Keep it warm, professional and focused on the next step. Stay under 150 words.",
            context
        ),
        CopilotAction::ValueHypothesis => format!(
            "Write a value hypothesis for this opportunity.\n\n{}\n\n\
Structure it as:\n\
1. The business challenge being addressed\n\
2. The proposed approach\n\
3. Expected outcomes and ROI indicators\n\
Keep it tight.",
            context
        ),
    }
}
