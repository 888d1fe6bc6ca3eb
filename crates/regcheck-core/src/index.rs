use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{RegcheckError, Result};
use crate::models::{ComplianceRule, RegulationSource, RuleEmbedding};

/// A stored rule paired with its cosine similarity to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRule {
    pub rule: ComplianceRule,
    pub score: f32,
}

#[derive(Debug, Clone)]
struct IndexedRegulation {
    text: String,
    source: RegulationSource,
    category: String,
    vector: Vec<f32>,
}

/// Write-once vector index over embedded regulations.
///
/// Insertion order is kept so that equal-score neighbors come back in the
/// order they were ingested.
#[derive(Debug, Default, Clone)]
pub struct RegulationIndex {
    entries: HashMap<Arc<str>, IndexedRegulation>,
    order: Vec<Arc<str>>,
    dim: Option<usize>,
}

impl RegulationIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an embedded rule. Returns `false` when the id is already present.
    pub fn insert(&mut self, rule: ComplianceRule) -> Result<bool> {
        if self.entries.contains_key(rule.id.as_str()) {
            return Ok(false);
        }
        let RuleEmbedding::Embedded(vector) = rule.embedding else {
            return Err(RegcheckError::Validation(format!(
                "rule {} has no embedding",
                rule.id
            )));
        };
        if vector.is_empty() {
            return Err(RegcheckError::Validation(format!(
                "rule {} has an empty embedding",
                rule.id
            )));
        }
        match self.dim {
            Some(expected) if expected != vector.len() => {
                return Err(RegcheckError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dim = Some(vector.len()),
        }

        let key: Arc<str> = Arc::from(rule.id.as_str());
        self.entries.insert(
            key.clone(),
            IndexedRegulation {
                text: rule.text,
                source: rule.source,
                category: rule.category,
                vector,
            },
        );
        self.order.push(key);
        Ok(true)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<ComplianceRule> {
        self.entries
            .get_key_value(id)
            .map(|(key, entry)| materialize(key, entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dim
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.dim = None;
    }

    /// Returns up to `k` rules ranked by descending cosine similarity.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRule>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored = Vec::with_capacity(self.order.len());
        for (position, key) in self.order.iter().enumerate() {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            let score = cosine_similarity(query, &entry.vector)?;
            scored.push((position, key, entry, score));
        }
        scored.sort_by(|a, b| score_ordering(a.3, b.3).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(_, key, entry, score)| ScoredRule {
                rule: materialize(key, entry),
                score,
            })
            .collect())
    }

    #[must_use]
    pub fn rules(&self, source: Option<RegulationSource>) -> Vec<ComplianceRule> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get_key_value(key))
            .filter(|(_, entry)| source.is_none_or(|wanted| entry.source == wanted))
            .map(|(key, entry)| materialize(key, entry))
            .collect()
    }

    #[must_use]
    pub fn counts_by_source(&self) -> BTreeMap<RegulationSource, usize> {
        let mut out = RegulationSource::ALL
            .into_iter()
            .map(|source| (source, 0usize))
            .collect::<BTreeMap<_, _>>();
        for entry in self.entries.values() {
            *out.entry(entry.source).or_insert(0) += 1;
        }
        out
    }
}

fn materialize(key: &Arc<str>, entry: &IndexedRegulation) -> ComplianceRule {
    ComplianceRule {
        id: key.to_string(),
        text: entry.text.clone(),
        source: entry.source,
        category: entry.category.clone(),
        embedding: RuleEmbedding::Embedded(entry.vector.clone()),
    }
}

/// Descending by score; NaN-free inputs assumed, incomparable pairs are equal.
pub(crate) fn score_ordering(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Cosine similarity clamped to `[-1, 1]`. Zero vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RegcheckError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !cosine.is_finite() {
        return Err(RegcheckError::Embedding(
            "cosine similarity is not finite".to_string(),
        ));
    }
    #[allow(clippy::cast_possible_truncation, reason = "score range is [-1, 1]")]
    let score = cosine.clamp(-1.0, 1.0) as f32;
    Ok(score)
}
