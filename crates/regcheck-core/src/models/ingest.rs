use serde::{Deserialize, Serialize};

use super::RegulationSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    pub source: RegulationSource,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub skipped_blank: usize,
    pub skipped_duplicate: usize,
    #[serde(default)]
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.skipped_existing += other.skipped_existing;
        self.skipped_blank += other.skipped_blank;
        self.skipped_duplicate += other.skipped_duplicate;
        self.failures.extend(other.failures);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusOutcome {
    pub corpus: String,
    pub source: RegulationSource,
    pub loaded: usize,
    pub inserted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub corpora: Vec<CorpusOutcome>,
    pub total_inserted: usize,
    pub rule_count: usize,
    /// No corpus produced any rule and the knowledge base is empty.
    pub total_failure: bool,
}
