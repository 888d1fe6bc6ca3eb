use std::sync::Arc;

use tracing::{debug, error};

use crate::config::CheckerConfig;
use crate::error::{RegcheckError, Result};
use crate::index::{ScoredRule, cosine_similarity, score_ordering};
use crate::knowledge::RegulationRetriever;
use crate::models::{
    BatchVerdict, ComplianceDetail, ComplianceVerdict, ComplianceWarning, MaintenanceAction,
    RegulationSource,
};
use crate::report::{render_consolidated, render_structured};

/// Turns retrieval results into tiered compliance verdicts.
///
/// Stateless per call; any failure while checking one action becomes a
/// degraded verdict for that action instead of an error.
#[derive(Clone)]
pub struct ComplianceChecker {
    retriever: Arc<dyn RegulationRetriever>,
    config: CheckerConfig,
}

impl std::fmt::Debug for ComplianceChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceChecker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ComplianceChecker {
    pub fn new(retriever: Arc<dyn RegulationRetriever>, config: CheckerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { retriever, config })
    }

    #[must_use]
    pub const fn config(&self) -> &CheckerConfig {
        &self.config
    }

    #[must_use]
    pub fn check_compliance(&self, action: &MaintenanceAction) -> ComplianceVerdict {
        match self.evaluate(action) {
            Ok(verdict) => verdict,
            Err(err) => {
                error!(action_id = %action.id, error = %err, "compliance check failed");
                ComplianceVerdict::failed(&action.id, &err)
            }
        }
    }

    /// Checks every action in order. Each returned entry carries the same
    /// consolidated document covering the whole batch.
    #[must_use]
    pub fn check_compliance_batch(&self, actions: &[MaintenanceAction]) -> Vec<BatchVerdict> {
        let verdicts = actions
            .iter()
            .map(|action| self.check_compliance(action))
            .collect::<Vec<_>>();
        let consolidated = render_consolidated(actions, &verdicts);
        actions
            .iter()
            .zip(verdicts)
            .map(|(action, verdict)| BatchVerdict {
                report: render_structured(action, &verdict),
                verdict,
                consolidated_report: consolidated.clone(),
            })
            .collect()
    }

    fn evaluate(&self, action: &MaintenanceAction) -> Result<ComplianceVerdict> {
        let query = action.query_text();
        let Some(retrieval) = self.retriever.retrieve(&query, self.config.retrieval_k)? else {
            debug!(action_id = %action.id, "no regulations available for action");
            return Ok(ComplianceVerdict::no_matching_rules(&action.id));
        };

        let mut scored = Vec::with_capacity(retrieval.rules.len());
        for rule in retrieval.rules {
            let Some(vector) = rule.embedding.as_vector() else {
                return Err(RegcheckError::Internal(format!(
                    "rule {} was retrieved without an embedding",
                    rule.id
                )));
            };
            let score = cosine_similarity(&retrieval.query_embedding, vector)?;
            scored.push(ScoredRule { rule, score });
        }

        let verdict = classify(&action.id, scored, &self.config);
        debug!(
            action_id = %action.id,
            candidates = verdict.details.len(),
            overall_compliant = verdict.overall_compliant,
            warning = verdict.warning.as_ref().map_or("none", ComplianceWarning::kind),
            "compliance check complete"
        );
        Ok(verdict)
    }
}

/// Builds a verdict from scored rules listed in retrieval order.
pub(crate) fn classify(
    action_id: &str,
    scored: Vec<ScoredRule>,
    config: &CheckerConfig,
) -> ComplianceVerdict {
    if scored.is_empty() {
        return ComplianceVerdict::no_matching_rules(action_id);
    }

    let mut details = scored
        .into_iter()
        .map(|ScoredRule { rule, score }| ComplianceDetail {
            rule_id: rule.id,
            source: rule.source,
            category: rule.category,
            regulation_text: rule.text,
            similarity_score: score,
            compliant: score >= config.similarity_threshold,
        })
        .collect::<Vec<_>>();

    let is_high = |detail: &ComplianceDetail| detail.similarity_score > config.high_confidence_cutoff;
    let is_medium = |detail: &ComplianceDetail| {
        detail.similarity_score >= config.similarity_threshold
            && detail.similarity_score <= config.high_confidence_cutoff
    };

    let overall_compliant = details
        .iter()
        .any(|detail| is_high(detail) && detail.compliant);
    let warning = select_warning(&details, is_high, is_medium);

    details.sort_by(|a, b| score_ordering(a.similarity_score, b.similarity_score));

    ComplianceVerdict {
        action_id: action_id.to_string(),
        overall_compliant,
        details,
        warning,
    }
}

/// First matching condition wins; official-source gaps outrank confidence tiers.
fn select_warning(
    details: &[ComplianceDetail],
    is_high: impl Fn(&ComplianceDetail) -> bool,
    is_medium: impl Fn(&ComplianceDetail) -> bool,
) -> Option<ComplianceWarning> {
    let from = |source: RegulationSource| {
        details
            .iter()
            .filter(move |detail| detail.source == source)
    };

    let mut official = from(RegulationSource::OfficialGuideline).peekable();
    if official.peek().is_none() {
        return Some(ComplianceWarning::NoOfficialGuideline);
    }
    if !official.any(|detail| detail.compliant) {
        return Some(ComplianceWarning::OfficialGuidelineNonCompliant);
    }

    let mut primary = from(RegulationSource::PrimaryReference).peekable();
    if primary.peek().is_some() && !primary.any(|detail| detail.compliant) {
        return Some(ComplianceWarning::ReferenceVerificationRequired);
    }

    let any_high = details.iter().any(|detail| is_high(detail));
    let any_medium = details.iter().any(|detail| is_medium(detail));
    match (any_high, any_medium) {
        (false, true) => Some(ComplianceWarning::ModerateConfidence),
        (false, false) => Some(ComplianceWarning::LowConfidence),
        (true, _) => None,
    }
}
