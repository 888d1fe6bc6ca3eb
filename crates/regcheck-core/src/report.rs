//! Rendering of compliance verdicts.
//!
//! Both renderers are pure. The consolidated document layout (section
//! headers, rule lines, checkmark and attention symbols) is consumed by
//! downstream tooling and must stay byte-stable.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ComplianceVerdict, MaintenanceAction, RegulationSource, status_label};

pub const CONSOLIDATED_TITLE: &str = "Nuclear Maintenance Compliance Report (Consolidated)";
pub const COMPLIANT_RECOMMENDATION: &str =
    "✓ The maintenance action complies with nuclear safety regulations.";
pub const REVISION_RECOMMENDATIONS: [&str; 4] = [
    "⚠ ATTENTION: This action requires revision to ensure compliance:",
    "  - Review and align with relevant nuclear safety standards",
    "  - Consult with nuclear safety officers",
    "  - Document all modifications and justifications",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetails {
    pub id: String,
    pub component: String,
    pub proposed_action: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDetail {
    pub rule_id: String,
    pub source: RegulationSource,
    pub regulation: String,
    pub similarity_score: f32,
    pub status: String,
}

/// Per-action record returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub timestamp: DateTime<Utc>,
    pub action_details: ActionDetails,
    pub compliance_status: String,
    pub warning: Option<String>,
    pub details: Vec<ReportDetail>,
    pub recommendations: Vec<String>,
}

#[must_use]
pub fn recommendations(compliant: bool) -> Vec<String> {
    if compliant {
        vec![COMPLIANT_RECOMMENDATION.to_string()]
    } else {
        REVISION_RECOMMENDATIONS
            .iter()
            .map(|line| (*line).to_string())
            .collect()
    }
}

#[must_use]
pub fn render_structured(action: &MaintenanceAction, verdict: &ComplianceVerdict) -> StructuredReport {
    render_structured_at(action, verdict, Utc::now())
}

#[must_use]
pub fn render_structured_at(
    action: &MaintenanceAction,
    verdict: &ComplianceVerdict,
    timestamp: DateTime<Utc>,
) -> StructuredReport {
    StructuredReport {
        timestamp,
        action_details: ActionDetails {
            id: action.id.clone(),
            component: action.component.clone(),
            proposed_action: action.proposed_action.clone(),
            description: action.description.clone(),
        },
        compliance_status: verdict.status().to_string(),
        warning: verdict.warning_text(),
        details: verdict
            .details
            .iter()
            .map(|detail| ReportDetail {
                rule_id: detail.rule_id.clone(),
                source: detail.source,
                regulation: detail.regulation_text.clone(),
                similarity_score: detail.similarity_score,
                status: status_label(detail.compliant).to_string(),
            })
            .collect(),
        recommendations: recommendations(verdict.overall_compliant),
    }
}

/// Renders one document covering every action, stamped with local time.
#[must_use]
pub fn render_consolidated(actions: &[MaintenanceAction], verdicts: &[ComplianceVerdict]) -> String {
    render_consolidated_at(actions, verdicts, Local::now().naive_local())
}

/// Pairs actions with verdicts positionally; extra entries on either side are ignored.
#[must_use]
pub fn render_consolidated_at(
    actions: &[MaintenanceAction],
    verdicts: &[ComplianceVerdict],
    generated_on: NaiveDateTime,
) -> String {
    let pairs = actions.iter().zip(verdicts).enumerate().map(|(idx, pair)| (idx + 1, pair));

    let mut out = format!(
        "{CONSOLIDATED_TITLE}\n{}\nGenerated on: {}\n\nSummary of Maintenance Actions\n{}",
        "=".repeat(35),
        generated_on.format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(28),
    );

    for (idx, (action, verdict)) in pairs.clone() {
        out.push_str(&format!(
            "\nAction {idx}:\n- ID: {}\n- Component: {}\n- Proposed Action: {}\n- Overall Compliance Status: {}",
            action.id,
            action.component,
            action.proposed_action,
            verdict.status(),
        ));
    }

    out.push_str(&format!("\n\nDetailed Compliance Analysis\n{}", "=".repeat(27)));
    for (idx, (_, verdict)) in pairs.clone() {
        out.push_str(&format!("\n\nAction {idx} Details:\n{}", "-".repeat(18)));
        if let Some(warning) = verdict.warning_text() {
            out.push_str(&format!("\nWARNING: {warning}"));
        }
        for detail in &verdict.details {
            out.push_str(&format!(
                "\nRule: {}\nSource: {}\nRegulation Text: {}\nSimilarity Score: {:.2}\nStatus: {}\n---",
                detail.rule_id,
                detail.source.label(),
                detail.regulation_text,
                detail.similarity_score,
                status_label(detail.compliant),
            ));
        }
    }

    out.push_str(&format!("\n\nRecommendations\n{}", "=".repeat(15)));
    for (idx, (action, verdict)) in pairs {
        out.push_str(&format!("\n\nAction {idx} ({}):", action.id));
        for line in recommendations(verdict.overall_compliant) {
            out.push('\n');
            out.push_str(&line);
        }
    }
    out
}
