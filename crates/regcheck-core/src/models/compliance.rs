use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::report::StructuredReport;

use super::RegulationSource;

pub const STATUS_COMPLIANT: &str = "COMPLIANT";
pub const STATUS_NON_COMPLIANT: &str = "NON-COMPLIANT";

#[must_use]
pub const fn status_label(compliant: bool) -> &'static str {
    if compliant {
        STATUS_COMPLIANT
    } else {
        STATUS_NON_COMPLIANT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceAction {
    pub id: String,
    pub description: String,
    pub component: String,
    pub proposed_action: String,
    pub timestamp: DateTime<Utc>,
}

impl MaintenanceAction {
    /// Composite retrieval and scoring text for this action.
    #[must_use]
    pub fn query_text(&self) -> String {
        format!(
            "Component: {}\nAction: {}\nDescription: {}",
            self.component.trim(),
            self.proposed_action.trim(),
            self.description.trim()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceDetail {
    pub rule_id: String,
    pub source: RegulationSource,
    pub category: String,
    pub regulation_text: String,
    pub similarity_score: f32,
    pub compliant: bool,
}

/// At most one warning is attached to a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceWarning {
    NoMatchingRegulations,
    NoOfficialGuideline,
    OfficialGuidelineNonCompliant,
    ReferenceVerificationRequired,
    ModerateConfidence,
    LowConfidence,
    CheckFailed(String),
}

impl ComplianceWarning {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoMatchingRegulations => "no_matching_regulations",
            Self::NoOfficialGuideline => "no_official_guideline",
            Self::OfficialGuidelineNonCompliant => "official_guideline_non_compliant",
            Self::ReferenceVerificationRequired => "reference_verification_required",
            Self::ModerateConfidence => "moderate_confidence",
            Self::LowConfidence => "low_confidence",
            Self::CheckFailed(_) => "check_failed",
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NoMatchingRegulations => "No matching regulations found. Please review against current NRC guidelines and safety standards.".to_string(),
            Self::NoOfficialGuideline => "⚠ CRITICAL: No matching NRC guidelines found. Action requires immediate review against official NRC regulations.".to_string(),
            Self::OfficialGuidelineNonCompliant => "⚠ WARNING: Action may not comply with NRC guidelines. Please review against official regulations.".to_string(),
            Self::ReferenceVerificationRequired => "⚠ NOTICE: Action requires additional verification against nuclear safety best practices from NuclearQA reference.".to_string(),
            Self::ModerateConfidence => "⚠ CAUTION: Found potential matching regulations but confidence level is moderate. Please review manually.".to_string(),
            Self::LowConfidence => "⚠ ALERT: Low confidence in regulation matches. Please consult with nuclear safety officers.".to_string(),
            Self::CheckFailed(reason) => format!("Error processing compliance check: {reason}"),
        }
    }
}

impl fmt::Display for ComplianceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl Serialize for ComplianceWarning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceVerdict {
    pub action_id: String,
    pub overall_compliant: bool,
    #[serde(rename = "compliance_details")]
    pub details: Vec<ComplianceDetail>,
    pub warning: Option<ComplianceWarning>,
}

impl ComplianceVerdict {
    #[must_use]
    pub fn no_matching_rules(action_id: impl Into<String>) -> Self {
        Self::terminal(action_id, ComplianceWarning::NoMatchingRegulations)
    }

    #[must_use]
    pub fn failed(action_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::terminal(action_id, ComplianceWarning::CheckFailed(reason.to_string()))
    }

    fn terminal(action_id: impl Into<String>, warning: ComplianceWarning) -> Self {
        Self {
            action_id: action_id.into(),
            overall_compliant: false,
            details: Vec::new(),
            warning: Some(warning),
        }
    }

    #[must_use]
    pub const fn status(&self) -> &'static str {
        status_label(self.overall_compliant)
    }

    #[must_use]
    pub fn warning_text(&self) -> Option<String> {
        self.warning.as_ref().map(ComplianceWarning::message)
    }
}

/// Verdict from a batch request; every entry carries the same consolidated document.
#[derive(Debug, Clone, Serialize)]
pub struct BatchVerdict {
    #[serde(flatten)]
    pub verdict: ComplianceVerdict,
    pub report: StructuredReport,
    pub consolidated_report: String,
}
