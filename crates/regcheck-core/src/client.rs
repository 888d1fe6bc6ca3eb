use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::checker::ComplianceChecker;
use crate::config::{AppConfig, CheckerConfig};
use crate::corpus::CorpusLoader;
use crate::embedding::{EmbeddingProfile, build_embedder};
use crate::error::Result;
use crate::knowledge::KnowledgeBase;
use crate::models::{
    BatchVerdict, BootstrapReport, ComplianceRule, ComplianceVerdict, IngestReport,
    MaintenanceAction, RegulationRecord, RegulationSource,
};
use crate::state::SqliteRegulationStore;

pub const STATE_DB_FILE: &str = ".regcheck_state.sqlite3";

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub root: Option<PathBuf>,
    pub persistent: bool,
    pub embedding: EmbeddingProfile,
    pub rule_count: usize,
    pub rules_by_source: BTreeMap<RegulationSource, usize>,
    pub checker: CheckerConfig,
}

/// Process-wide entry point: one knowledge base and the checker bound to it.
#[derive(Clone)]
pub struct Regcheck {
    root: Option<PathBuf>,
    kb: Arc<KnowledgeBase>,
    checker: ComplianceChecker,
}

impl std::fmt::Debug for Regcheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regcheck")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Regcheck {
    /// Opens the workspace at `root_dir` using environment configuration.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(root_dir, &AppConfig::from_env()?)
    }

    pub fn open(root_dir: impl Into<PathBuf>, config: &AppConfig) -> Result<Self> {
        let root = root_dir.into();
        fs::create_dir_all(&root)?;
        let state = SqliteRegulationStore::open(root.join(STATE_DB_FILE))?;
        let embedder = build_embedder(&config.embedding)?;
        let kb = Arc::new(KnowledgeBase::open(state, embedder)?);
        let checker = ComplianceChecker::new(kb.clone(), config.checker)?;
        Ok(Self {
            root: Some(root),
            kb,
            checker,
        })
    }

    /// Wires an already constructed knowledge base, e.g. an in-memory one.
    pub fn with_components(kb: Arc<KnowledgeBase>, config: CheckerConfig) -> Result<Self> {
        let checker = ComplianceChecker::new(kb.clone(), config)?;
        Ok(Self {
            root: None,
            kb,
            checker,
        })
    }

    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    #[must_use]
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.kb
    }

    #[must_use]
    pub const fn checker(&self) -> &ComplianceChecker {
        &self.checker
    }

    #[must_use]
    pub fn ingest(&self, records: &[RegulationRecord]) -> IngestReport {
        self.kb.ingest(records)
    }

    #[must_use]
    pub fn bootstrap(&self, loaders: &[Box<dyn CorpusLoader>]) -> BootstrapReport {
        self.kb.bootstrap(loaders)
    }

    #[must_use]
    pub fn check_compliance(&self, action: &MaintenanceAction) -> ComplianceVerdict {
        self.checker.check_compliance(action)
    }

    #[must_use]
    pub fn check_compliance_batch(&self, actions: &[MaintenanceAction]) -> Vec<BatchVerdict> {
        self.checker.check_compliance_batch(actions)
    }

    pub fn rules(&self, source: Option<RegulationSource>) -> Result<Vec<ComplianceRule>> {
        self.kb.rules(source)
    }

    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            root: self.root.clone(),
            persistent: self.kb.is_persistent(),
            embedding: self.kb.profile(),
            rule_count: self.kb.rule_count()?,
            rules_by_source: self.kb.rule_counts()?,
            checker: *self.checker.config(),
        })
    }
}
