//! Failure-risk assessment contract and maintenance suggestion policy.
//!
//! The failure classifier itself is external. This module derives the
//! time-series features it expects, ranks readings by predicted failure
//! probability, and maps attributions onto a closed set of suggestions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{RegcheckError, Result};

pub const DEFAULT_FEATURE_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFeature {
    AirTemperature,
    ProcessTemperature,
    RotationalSpeed,
    Torque,
    ProductType,
    ToolWear,
    TorqueRollingMean,
    RotationalSpeedDiff,
    ToolWearRollingMean,
}

impl SensorFeature {
    pub const ALL: [Self; 9] = [
        Self::AirTemperature,
        Self::ProcessTemperature,
        Self::RotationalSpeed,
        Self::Torque,
        Self::ProductType,
        Self::ToolWear,
        Self::TorqueRollingMean,
        Self::RotationalSpeedDiff,
        Self::ToolWearRollingMean,
    ];

    /// Column name used by the training dataset.
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::AirTemperature => "Air temperature [K]",
            Self::ProcessTemperature => "Process temperature [K]",
            Self::RotationalSpeed => "Rotational speed [rpm]",
            Self::Torque => "Torque [Nm]",
            Self::ProductType => "Type",
            Self::ToolWear => "Tool wear [min]",
            Self::TorqueRollingMean => "Torque_RollingMean",
            Self::RotationalSpeedDiff => "RotationalSpeed_Diff",
            Self::ToolWearRollingMean => "ToolWear_RollingMean",
        }
    }
}

/// Product quality variant. Codes follow the label encoding used at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "H")]
    High,
    #[serde(rename = "L")]
    Low,
    #[serde(rename = "M")]
    Medium,
}

impl ProductType {
    #[must_use]
    pub const fn code(self) -> f64 {
        match self {
            Self::High => 0.0,
            Self::Low => 1.0,
            Self::Medium => 2.0,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H" => Ok(Self::High),
            "L" => Ok(Self::Low),
            "M" => Ok(Self::Medium),
            other => Err(RegcheckError::Validation(format!(
                "unknown product type: {other} (expected H|L|M)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub torque_rolling_mean: f64,
    pub rotational_speed_diff: f64,
    pub tool_wear_rolling_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub product_id: Option<String>,
    pub air_temperature_k: f64,
    pub process_temperature_k: f64,
    pub rotational_speed_rpm: f64,
    pub torque_nm: f64,
    pub product_type: ProductType,
    pub tool_wear_min: f64,
    #[serde(default)]
    pub derived: DerivedFeatures,
}

impl SensorReading {
    #[must_use]
    pub const fn value(&self, feature: SensorFeature) -> f64 {
        match feature {
            SensorFeature::AirTemperature => self.air_temperature_k,
            SensorFeature::ProcessTemperature => self.process_temperature_k,
            SensorFeature::RotationalSpeed => self.rotational_speed_rpm,
            SensorFeature::Torque => self.torque_nm,
            SensorFeature::ProductType => self.product_type.code(),
            SensorFeature::ToolWear => self.tool_wear_min,
            SensorFeature::TorqueRollingMean => self.derived.torque_rolling_mean,
            SensorFeature::RotationalSpeedDiff => self.derived.rotational_speed_diff,
            SensorFeature::ToolWearRollingMean => self.derived.tool_wear_rolling_mean,
        }
    }

    /// Feature vector in `SensorFeature::ALL` order.
    #[must_use]
    pub fn feature_vector(&self) -> Vec<f64> {
        SensorFeature::ALL
            .into_iter()
            .map(|feature| self.value(feature))
            .collect()
    }
}

/// Fills rolling means over the trailing `window` rows (partial windows at
/// the start) and the first difference of rotational speed (0 on the first row).
pub fn derive_time_series_features(readings: &mut [SensorReading], window: usize) {
    let window = window.max(1);
    let torque = readings.iter().map(|r| r.torque_nm).collect::<Vec<_>>();
    let tool_wear = readings.iter().map(|r| r.tool_wear_min).collect::<Vec<_>>();
    let speed = readings
        .iter()
        .map(|r| r.rotational_speed_rpm)
        .collect::<Vec<_>>();

    for (row, reading) in readings.iter_mut().enumerate() {
        let start = (row + 1).saturating_sub(window);
        reading.derived = DerivedFeatures {
            torque_rolling_mean: mean(&torque[start..=row]),
            rotational_speed_diff: if row == 0 { 0.0 } else { speed[row] - speed[row - 1] },
            tool_wear_rolling_mean: mean(&tool_wear[start..=row]),
        };
    }
}

#[allow(clippy::cast_precision_loss, reason = "window lengths are small")]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: SensorFeature,
    pub value: f64,
}

/// Per-feature contribution to one prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub contributions: Vec<FeatureContribution>,
}

impl FeatureAttribution {
    pub fn new(contributions: impl IntoIterator<Item = (SensorFeature, f64)>) -> Self {
        Self {
            contributions: contributions
                .into_iter()
                .map(|(feature, value)| FeatureContribution { feature, value })
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, feature: SensorFeature) -> Option<f64> {
        self.contributions
            .iter()
            .find(|contribution| contribution.feature == feature)
            .map(|contribution| contribution.value)
    }

    /// Contributions by descending magnitude; equal magnitudes keep input order.
    #[must_use]
    pub fn ranked(&self) -> Vec<FeatureContribution> {
        let mut ranked = self.contributions.clone();
        ranked.sort_by(|a, b| {
            b.value
                .abs()
                .partial_cmp(&a.value.abs())
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    ToolReplacement,
    CoolingInspection,
    GeneralInspection,
}

impl SuggestionCategory {
    /// The category a dominant feature maps to, if that feature has one.
    #[must_use]
    pub const fn for_feature(feature: SensorFeature) -> Option<Self> {
        match feature {
            SensorFeature::ToolWear => Some(Self::ToolReplacement),
            SensorFeature::AirTemperature => Some(Self::CoolingInspection),
            SensorFeature::ProcessTemperature
            | SensorFeature::RotationalSpeed
            | SensorFeature::Torque
            | SensorFeature::ProductType
            | SensorFeature::TorqueRollingMean
            | SensorFeature::RotationalSpeedDiff
            | SensorFeature::ToolWearRollingMean => None,
        }
    }

    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::ToolReplacement => Severity::High,
            Self::CoolingInspection | Self::GeneralInspection => Severity::Medium,
        }
    }

    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::ToolReplacement => "Immediate tool replacement recommended",
            Self::CoolingInspection => "Cooling system inspection needed",
            Self::GeneralInspection => "General maintenance inspection recommended",
        }
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::ToolReplacement => {
                "Excessive tool wear is the primary factor contributing to potential failure"
            }
            Self::CoolingInspection => {
                "Elevated air temperature detected beyond optimal operating range"
            }
            Self::GeneralInspection => "Multiple factors contributing to potential failure",
        }
    }

    #[must_use]
    pub const fn instructions(self) -> &'static str {
        match self {
            Self::ToolReplacement => {
                "1. Stop machine operation\n2. Replace worn tooling components\n3. Perform calibration check\n4. Document maintenance in log"
            }
            Self::CoolingInspection => {
                "1. Check coolant levels\n2. Inspect ventilation systems\n3. Clean heat exchangers\n4. Monitor temperature for 24 hours"
            }
            Self::GeneralInspection => "Perform comprehensive system diagnostic",
        }
    }

    #[must_use]
    pub fn suggestion(self) -> MaintenanceSuggestion {
        MaintenanceSuggestion {
            category: self,
            severity: self.severity(),
            action: self.action().to_string(),
            reason: self.reason().to_string(),
            instructions: self.instructions().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSuggestion {
    pub category: SuggestionCategory,
    pub severity: Severity,
    pub action: String,
    pub reason: String,
    pub instructions: String,
}

/// Picks the category of the most influential feature that has one.
#[must_use]
pub fn suggest_maintenance(attribution: &FeatureAttribution) -> SuggestionCategory {
    attribution
        .ranked()
        .into_iter()
        .find_map(|contribution| SuggestionCategory::for_feature(contribution.feature))
        .unwrap_or(SuggestionCategory::GeneralInspection)
}

/// External failure model: probability of failure plus per-feature explanation.
pub trait FailureClassifier: Send + Sync {
    fn predict_probability(&self, reading: &SensorReading) -> Result<f64>;
    fn explain(&self, reading: &SensorReading) -> Result<FeatureAttribution>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAssessment {
    pub product_id: Option<String>,
    pub failure_probability: f64,
    /// 1 is the most likely to fail. Unset for single-reading assessments.
    pub criticality_rank: Option<usize>,
    pub maintenance_suggestion: MaintenanceSuggestion,
    pub attribution: FeatureAttribution,
}

pub fn assess(classifier: &dyn FailureClassifier, reading: &SensorReading) -> Result<FailureAssessment> {
    let mut prepared = [reading.clone()];
    derive_time_series_features(&mut prepared, DEFAULT_FEATURE_WINDOW);
    let [prepared] = prepared;
    assess_prepared(classifier, prepared)
}

/// Assesses readings in sequence order, then ranks them by descending
/// failure probability. Any classifier error fails the whole batch.
pub fn assess_batch(
    classifier: &dyn FailureClassifier,
    readings: &[SensorReading],
) -> Result<Vec<FailureAssessment>> {
    let mut prepared = readings.to_vec();
    derive_time_series_features(&mut prepared, DEFAULT_FEATURE_WINDOW);

    let mut assessments = prepared
        .into_iter()
        .map(|reading| assess_prepared(classifier, reading))
        .collect::<Result<Vec<_>>>()?;
    assessments.sort_by(|a, b| {
        b.failure_probability
            .partial_cmp(&a.failure_probability)
            .unwrap_or(Ordering::Equal)
    });
    for (rank, assessment) in assessments.iter_mut().enumerate() {
        assessment.criticality_rank = Some(rank + 1);
    }
    Ok(assessments)
}

fn assess_prepared(classifier: &dyn FailureClassifier, reading: SensorReading) -> Result<FailureAssessment> {
    let failure_probability = classifier.predict_probability(&reading)?;
    if !failure_probability.is_finite() || !(0.0..=1.0).contains(&failure_probability) {
        return Err(RegcheckError::Validation(format!(
            "classifier returned invalid probability {failure_probability}"
        )));
    }
    let attribution = classifier.explain(&reading)?;
    Ok(FailureAssessment {
        maintenance_suggestion: suggest_maintenance(&attribution).suggestion(),
        product_id: reading.product_id,
        failure_probability,
        criticality_rank: None,
        attribution,
    })
}
