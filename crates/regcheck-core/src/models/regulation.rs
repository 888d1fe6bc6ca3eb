use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RegcheckError, Result};

pub const DEFAULT_CATEGORY: &str = "Nuclear Safety";

/// The three recognized regulation corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulationSource {
    #[serde(alias = "NuclearQA Reference")]
    PrimaryReference,
    #[serde(alias = "NRC Guidelines")]
    OfficialGuideline,
    #[serde(alias = "Additional Guidelines")]
    Supplementary,
}

impl RegulationSource {
    pub const ALL: [Self; 3] = [
        Self::PrimaryReference,
        Self::OfficialGuideline,
        Self::Supplementary,
    ];

    /// Stable slug used in rule ids and persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryReference => "primary_reference",
            Self::OfficialGuideline => "official_guideline",
            Self::Supplementary => "supplementary",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PrimaryReference => "NuclearQA Reference",
            Self::OfficialGuideline => "NRC Guidelines",
            Self::Supplementary => "Additional Guidelines",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "primary_reference" | "primary" | "reference" | "nuclearqa_reference" => {
                Ok(Self::PrimaryReference)
            }
            "official_guideline" | "official" | "guideline" | "nrc_guidelines" | "nrc" => {
                Ok(Self::OfficialGuideline)
            }
            "supplementary" | "additional_guidelines" | "additional" => Ok(Self::Supplementary),
            _ => Err(RegcheckError::Validation(format!(
                "unknown regulation source: {raw} (expected primary_reference|official_guideline|supplementary)"
            ))),
        }
    }

    #[must_use]
    pub fn rule_id(self, row_index: usize) -> String {
        format!("{}_{row_index}", self.as_str())
    }
}

impl fmt::Display for RegulationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One raw tabular regulation row as supplied to ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulationRecord {
    pub text: String,
    pub source: RegulationSource,
    pub category: String,
}

impl RegulationRecord {
    pub fn new(
        text: impl Into<String>,
        source: RegulationSource,
        category: impl Into<String>,
    ) -> Self {
        let category = category.into();
        let category = if category.trim().is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category
        };
        Self {
            text: text.into(),
            source,
            category,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleEmbedding {
    Unembedded,
    Embedded(Vec<f32>),
}

impl RuleEmbedding {
    #[must_use]
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Self::Unembedded => None,
            Self::Embedded(vector) => Some(vector),
        }
    }

    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceRule {
    pub id: String,
    pub text: String,
    pub source: RegulationSource,
    pub category: String,
    pub embedding: RuleEmbedding,
}

impl ComplianceRule {
    #[must_use]
    pub fn unembedded(id: String, record: &RegulationRecord) -> Self {
        Self {
            id,
            text: record.text.clone(),
            source: record.source,
            category: record.category.clone(),
            embedding: RuleEmbedding::Unembedded,
        }
    }

    #[must_use]
    pub fn with_embedding(self, vector: Vec<f32>) -> Self {
        Self {
            embedding: RuleEmbedding::Embedded(vector),
            ..self
        }
    }
}
