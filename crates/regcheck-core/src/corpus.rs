use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RegcheckError, Result};
use crate::jsonl::{jsonl_all_lines_invalid, parse_jsonl_tolerant};
use crate::models::{RegulationRecord, RegulationSource};

/// A named supply of regulation rows for one source.
pub trait CorpusLoader: Send + Sync {
    fn name(&self) -> &str;
    fn source(&self) -> RegulationSource;
    fn load(&self) -> Result<Vec<RegulationRecord>>;
}

/// Tabular row as exported from the upstream datasets.
#[derive(Debug, Deserialize)]
struct RawRegulationRow {
    #[serde(default, alias = "regulation_text", alias = "program citation")]
    text: Option<String>,
    #[serde(default, alias = "law type", alias = "title")]
    category: Option<String>,
}

impl RawRegulationRow {
    fn into_record(self, source: RegulationSource) -> RegulationRecord {
        RegulationRecord::new(
            self.text.unwrap_or_default(),
            source,
            self.category.unwrap_or_default(),
        )
    }
}

/// Regulation rows read from a JSON array or JSON Lines file.
///
/// Rows without text are kept as blank records so later rows keep their
/// position-derived ids; ingestion skips them.
#[derive(Debug, Clone)]
pub struct JsonCorpus {
    name: String,
    source: RegulationSource,
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>, source: RegulationSource) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        Self { name, source, path }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses corpus content without touching the filesystem.
    pub fn parse(name: &str, source: RegulationSource, raw: &str) -> Result<Vec<RegulationRecord>> {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if trimmed.starts_with('[') {
            let rows: Vec<RawRegulationRow> =
                serde_json::from_str(trimmed).map_err(|err| RegcheckError::corpus(name, err))?;
            return Ok(rows.into_iter().map(|row| row.into_record(source)).collect());
        }

        let outcome = parse_jsonl_tolerant::<RawRegulationRow>(raw);
        if outcome.items.is_empty() && outcome.skipped_lines > 0 {
            return Err(jsonl_all_lines_invalid(
                name,
                outcome.skipped_lines,
                outcome.first_error.as_ref(),
            ));
        }
        if let Some((line_no, message)) = &outcome.first_error {
            tracing::warn!(
                corpus = name,
                skipped = outcome.skipped_lines,
                line = line_no,
                error = %message,
                "skipped invalid corpus lines"
            );
        }
        Ok(outcome
            .items
            .into_iter()
            .map(|row| row.into_record(source))
            .collect())
    }
}

impl CorpusLoader for JsonCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> RegulationSource {
        self.source
    }

    fn load(&self) -> Result<Vec<RegulationRecord>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| {
            RegcheckError::corpus(&self.name, format!("{}: {err}", self.path.display()))
        })?;
        Self::parse(&self.name, self.source, &raw)
    }
}

/// Records already held in memory.
#[derive(Clone)]
pub struct StaticCorpus {
    name: String,
    source: RegulationSource,
    records: Vec<RegulationRecord>,
}

impl fmt::Debug for StaticCorpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCorpus")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("records", &self.records.len())
            .finish()
    }
}

impl StaticCorpus {
    pub fn new(name: impl Into<String>, source: RegulationSource, texts: &[(&str, &str)]) -> Self {
        let records = texts
            .iter()
            .map(|(text, category)| RegulationRecord::new(*text, source, *category))
            .collect();
        Self {
            name: name.into(),
            source,
            records,
        }
    }
}

impl CorpusLoader for StaticCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> RegulationSource {
        self.source
    }

    fn load(&self) -> Result<Vec<RegulationRecord>> {
        Ok(self.records.clone())
    }
}
