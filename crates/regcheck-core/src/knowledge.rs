use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{error, info, warn};

use crate::corpus::CorpusLoader;
use crate::embedding::{Embedder, EmbeddingProfile};
use crate::error::{RegcheckError, Result};
use crate::index::RegulationIndex;
use crate::models::{
    BootstrapReport, ComplianceRule, CorpusOutcome, IngestFailure, IngestReport,
    RegulationRecord, RegulationSource,
};
use crate::state::SqliteRegulationStore;

/// Rules retrieved for one composed query, with the query vector used to find them.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub query_embedding: Vec<f32>,
    pub rules: Vec<ComplianceRule>,
}

/// Query-side view of a knowledge base, as consumed by the checker.
pub trait RegulationRetriever: Send + Sync {
    /// Embeds `query_text` once and returns up to `k` nearest rules.
    /// `None` means no rule is available to compare against.
    fn retrieve(&self, query_text: &str, k: usize) -> Result<Option<Retrieval>>;
}

/// Owns the regulation index and the embedder that fills it.
///
/// Readers share the index through a read lock. Ingestion is serialized by a
/// writer mutex, embeds without holding the index lock, and only takes the
/// write lock to publish fully embedded rules.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    index: Arc<RwLock<RegulationIndex>>,
    state: Option<SqliteRegulationStore>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("provider", &self.embedder.provider())
            .field("persistent", &self.state.is_some())
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    #[must_use]
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: Arc::new(RwLock::new(RegulationIndex::new())),
            state: None,
            writer: Mutex::new(()),
        }
    }

    /// Restores persisted rules. Vectors written by a different embedding
    /// profile are discarded so they never mix with fresh ones.
    pub fn open(state: SqliteRegulationStore, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let active = embedder.profile();
        match state.embedding_profile()? {
            Some(persisted) if persisted == active => {}
            Some(persisted) => {
                let dropped = state.clear_regulations()?;
                warn!(
                    persisted = %describe_profile(&persisted),
                    active = %describe_profile(&active),
                    dropped,
                    "embedding profile changed; discarded persisted regulation vectors"
                );
                state.set_embedding_profile(&active)?;
            }
            None => state.set_embedding_profile(&active)?,
        }

        let mut index = RegulationIndex::new();
        for rule in state.list_regulations()? {
            index.insert(rule)?;
        }
        info!(rules = index.len(), provider = embedder.provider(), "knowledge base restored");

        Ok(Self {
            embedder,
            index: Arc::new(RwLock::new(index)),
            state: Some(state),
            writer: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[must_use]
    pub fn profile(&self) -> EmbeddingProfile {
        self.embedder.profile()
    }

    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.state.is_some()
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, RegulationIndex>> {
        self.index
            .read()
            .map_err(|_| RegcheckError::mutex_poisoned("regulation index"))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, RegulationIndex>> {
        self.index
            .write()
            .map_err(|_| RegcheckError::mutex_poisoned("regulation index"))
    }

    /// Ingests records grouped by source. Row indices count every record of a
    /// source in call order, so skipped rows never shift later ids.
    ///
    /// A failing source group is logged and reported; the others proceed.
    pub fn ingest(&self, records: &[RegulationRecord]) -> IngestReport {
        self.ingest_tracked(records).0
    }

    /// Like `ingest`, also returning the positions in `records` that were inserted.
    fn ingest_tracked(&self, records: &[RegulationRecord]) -> (IngestReport, Vec<usize>) {
        let mut report = IngestReport::default();
        let mut inserted_rows = Vec::new();
        let _writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(_) => {
                let err = RegcheckError::mutex_poisoned("ingest writer");
                for source in distinct_sources(records) {
                    report.failures.push(IngestFailure {
                        source,
                        reason: err.to_string(),
                    });
                }
                return (report, inserted_rows);
            }
        };

        for source in distinct_sources(records) {
            let group = records
                .iter()
                .enumerate()
                .filter(|(_, record)| record.source == source)
                .collect::<Vec<_>>();
            match self.ingest_group(source, &group) {
                Ok((group_report, rows)) => {
                    info!(
                        source = source.as_str(),
                        inserted = group_report.inserted,
                        skipped_existing = group_report.skipped_existing,
                        skipped_blank = group_report.skipped_blank,
                        skipped_duplicate = group_report.skipped_duplicate,
                        "regulations ingested"
                    );
                    report.absorb(group_report);
                    inserted_rows.extend(rows);
                }
                Err(err) => {
                    warn!(source = source.as_str(), error = %err, "regulation ingestion failed");
                    report.failures.push(IngestFailure {
                        source,
                        reason: err.to_string(),
                    });
                }
            }
        }
        (report, inserted_rows)
    }

    fn ingest_group(
        &self,
        source: RegulationSource,
        group: &[(usize, &RegulationRecord)],
    ) -> Result<(IngestReport, Vec<usize>)> {
        let mut report = IngestReport::default();
        let mut seen_texts = HashSet::new();
        let mut positions = Vec::new();
        let mut pending = Vec::new();
        {
            let index = self.read_index()?;
            for (row, &(position, record)) in group.iter().enumerate() {
                let text = record.text.trim();
                if text.is_empty() {
                    report.skipped_blank += 1;
                    continue;
                }
                if !seen_texts.insert(text.to_string()) {
                    report.skipped_duplicate += 1;
                    continue;
                }
                let id = source.rule_id(row);
                if index.contains(&id) {
                    report.skipped_existing += 1;
                    continue;
                }
                positions.push(position);
                pending.push(ComplianceRule::unembedded(id, record));
            }
        }
        if pending.is_empty() {
            return Ok((report, Vec::new()));
        }

        let dim = self.embedder.dimension();
        let mut embedded = Vec::with_capacity(pending.len());
        for rule in pending {
            let vector = self.embedder.embed(&rule.text)?;
            if vector.len() != dim {
                return Err(RegcheckError::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
            embedded.push(rule.with_embedding(vector));
        }

        if let Some(state) = &self.state {
            state.insert_regulations(&embedded)?;
        }
        let mut inserted_rows = Vec::with_capacity(embedded.len());
        let mut index = self.write_index()?;
        for (position, rule) in positions.into_iter().zip(embedded) {
            if index.insert(rule)? {
                report.inserted += 1;
                inserted_rows.push(position);
            } else {
                report.skipped_existing += 1;
            }
        }
        drop(index);
        Ok((report, inserted_rows))
    }

    /// Loads every corpus, then ingests all loaded rows in one pass so that
    /// corpora sharing a source continue one row sequence. A corpus that fails
    /// to load is recorded and skipped; an empty knowledge base afterwards is a
    /// total failure.
    pub fn bootstrap(&self, loaders: &[Box<dyn CorpusLoader>]) -> BootstrapReport {
        let mut records = Vec::new();
        let mut spans = Vec::with_capacity(loaders.len());
        for loader in loaders {
            match loader.load() {
                Ok(loaded) => {
                    let start = records.len();
                    records.extend(loaded.into_iter().map(|record| RegulationRecord {
                        source: loader.source(),
                        ..record
                    }));
                    spans.push(Ok(start..records.len()));
                }
                Err(err) => {
                    warn!(corpus = loader.name(), error = %err, "corpus failed to load");
                    spans.push(Err(err.to_string()));
                }
            }
        }

        let (ingested, inserted_rows) = self.ingest_tracked(&records);
        let mut report = BootstrapReport::default();
        for (loader, span) in loaders.iter().zip(spans) {
            let source = loader.source();
            let outcome = match span {
                Ok(span) => CorpusOutcome {
                    corpus: loader.name().to_string(),
                    source,
                    loaded: span.len(),
                    inserted: inserted_rows
                        .iter()
                        .filter(|&&row| span.contains(&row))
                        .count(),
                    error: if span.is_empty() {
                        None
                    } else {
                        ingested
                            .failures
                            .iter()
                            .find(|failure| failure.source == source)
                            .map(|failure| failure.reason.clone())
                    },
                },
                Err(reason) => CorpusOutcome {
                    corpus: loader.name().to_string(),
                    source,
                    loaded: 0,
                    inserted: 0,
                    error: Some(reason),
                },
            };
            report.total_inserted += outcome.inserted;
            report.corpora.push(outcome);
        }

        report.rule_count = match self.rule_count() {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "could not count rules after bootstrap");
                0
            }
        };
        report.total_failure = report.rule_count == 0;
        if report.total_failure {
            error!(
                corpora = report.corpora.len(),
                "no regulation corpus could be loaded; knowledge base is empty"
            );
        } else {
            info!(
                corpora = report.corpora.len(),
                inserted = report.total_inserted,
                rules = report.rule_count,
                "knowledge base bootstrap complete"
            );
        }
        report
    }

    /// Embeds `query_text` once and returns up to `k` nearest rules, each
    /// carrying its stored embedding. Empty when nothing has been ingested.
    pub fn fetch_relevant(&self, query_text: &str, k: usize) -> Result<Vec<ComplianceRule>> {
        Ok(self
            .retrieve(query_text, k)?
            .map(|retrieval| retrieval.rules)
            .unwrap_or_default())
    }

    pub fn fetch_relevant_by_embedding(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ComplianceRule>> {
        let index = self.read_index()?;
        Ok(index
            .nearest(query_embedding, k)?
            .into_iter()
            .map(|hit| hit.rule)
            .collect())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_index()?.is_empty())
    }

    pub fn rule_count(&self) -> Result<usize> {
        Ok(self.read_index()?.len())
    }

    pub fn rules(&self, source: Option<RegulationSource>) -> Result<Vec<ComplianceRule>> {
        Ok(self.read_index()?.rules(source))
    }

    pub fn rule_counts(&self) -> Result<BTreeMap<RegulationSource, usize>> {
        Ok(self.read_index()?.counts_by_source())
    }
}

impl RegulationRetriever for KnowledgeBase {
    fn retrieve(&self, query_text: &str, k: usize) -> Result<Option<Retrieval>> {
        if self.is_empty()? {
            return Ok(None);
        }
        let query_embedding = self.embedder.embed(query_text)?;
        let rules = self.fetch_relevant_by_embedding(&query_embedding, k)?;
        if rules.is_empty() {
            return Ok(None);
        }
        Ok(Some(Retrieval {
            query_embedding,
            rules,
        }))
    }
}

fn distinct_sources(records: &[RegulationRecord]) -> Vec<RegulationSource> {
    let mut out = Vec::new();
    for record in records {
        if !out.contains(&record.source) {
            out.push(record.source);
        }
    }
    out
}

fn describe_profile(profile: &EmbeddingProfile) -> String {
    format!("{}/{}/{}", profile.provider, profile.vector_version, profile.dim)
}

#[cfg(test)]
mod tests;
