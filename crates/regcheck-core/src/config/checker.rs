use serde::Serialize;

use crate::error::{RegcheckError, Result};

use super::env::{read_env_f32, read_env_usize_optional};

const ENV_SIMILARITY_THRESHOLD: &str = "REGCHECK_SIMILARITY_THRESHOLD";
const ENV_HIGH_CONFIDENCE_CUTOFF: &str = "REGCHECK_HIGH_CONFIDENCE_CUTOFF";
const ENV_RETRIEVAL_K: &str = "REGCHECK_RETRIEVAL_K";

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
pub const DEFAULT_HIGH_CONFIDENCE_CUTOFF: f32 = 0.8;
pub const DEFAULT_RETRIEVAL_K: usize = 5;

/// Scoring tiers for the compliance checker.
///
/// A rule is compliant at `score >= similarity_threshold`; it is high
/// confidence only at `score > high_confidence_cutoff`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckerConfig {
    pub similarity_threshold: f32,
    pub high_confidence_cutoff: f32,
    pub retrieval_k: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            high_confidence_cutoff: DEFAULT_HIGH_CONFIDENCE_CUTOFF,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }
}

impl CheckerConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::resolve(
            read_env_f32(ENV_SIMILARITY_THRESHOLD),
            read_env_f32(ENV_HIGH_CONFIDENCE_CUTOFF),
            read_env_usize_optional(ENV_RETRIEVAL_K),
        )
    }

    /// Fills unset values with defaults and validates the result.
    pub fn resolve(
        similarity_threshold: Option<f32>,
        high_confidence_cutoff: Option<f32>,
        retrieval_k: Option<usize>,
    ) -> Result<Self> {
        let config = Self {
            similarity_threshold: similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            high_confidence_cutoff: high_confidence_cutoff
                .unwrap_or(DEFAULT_HIGH_CONFIDENCE_CUTOFF),
            retrieval_k: retrieval_k.unwrap_or(DEFAULT_RETRIEVAL_K),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            (ENV_SIMILARITY_THRESHOLD, self.similarity_threshold),
            (ENV_HIGH_CONFIDENCE_CUTOFF, self.high_confidence_cutoff),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(RegcheckError::Validation(format!(
                    "invalid {name}: {value} (expected a finite value in [-1, 1])"
                )));
            }
        }
        if self.high_confidence_cutoff < self.similarity_threshold {
            return Err(RegcheckError::Validation(format!(
                "invalid {ENV_HIGH_CONFIDENCE_CUTOFF}: {} is below {ENV_SIMILARITY_THRESHOLD} {}",
                self.high_confidence_cutoff, self.similarity_threshold
            )));
        }
        if self.retrieval_k == 0 {
            return Err(RegcheckError::Validation(format!(
                "invalid {ENV_RETRIEVAL_K}: must be at least 1"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_when_unset() {
        let config = CheckerConfig::resolve(None, None, None).expect("defaults");
        assert_eq!(config, CheckerConfig::default());
        assert!((config.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert!((config.high_confidence_cutoff - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.retrieval_k, 5);
    }

    #[test]
    fn resolve_accepts_overrides() {
        let config = CheckerConfig::resolve(Some(0.6), Some(0.9), Some(3)).expect("overrides");
        assert_eq!(config.retrieval_k, 3);
        assert!((config.high_confidence_cutoff - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn resolve_rejects_out_of_range_and_inverted_tiers() {
        assert!(CheckerConfig::resolve(Some(1.5), None, None).is_err());
        assert!(CheckerConfig::resolve(Some(f32::NAN), None, None).is_err());
        assert!(CheckerConfig::resolve(Some(0.85), Some(0.8), None).is_err());
        assert!(CheckerConfig::resolve(None, None, Some(0)).is_err());
    }
}
