use std::path::PathBuf;

use clap::{Args, ValueEnum};
use regcheck_core::models::RegulationSource;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Primary reference corpus (JSON array or JSON Lines).
    #[arg(long = "primary", value_name = "FILE")]
    pub primary: Vec<PathBuf>,
    /// Official guideline corpus (JSON array or JSON Lines).
    #[arg(long = "official", value_name = "FILE")]
    pub official: Vec<PathBuf>,
    /// Supplementary corpus (JSON array or JSON Lines).
    #[arg(long = "supplementary", value_name = "FILE")]
    pub supplementary: Vec<PathBuf>,
}

impl IngestArgs {
    pub fn corpora(&self) -> Vec<(RegulationSource, PathBuf)> {
        let tagged = |source: RegulationSource, paths: &[PathBuf]| {
            paths
                .iter()
                .map(move |path| (source, path.clone()))
                .collect::<Vec<_>>()
        };
        let mut out = tagged(RegulationSource::PrimaryReference, self.primary.as_slice());
        out.extend(tagged(RegulationSource::OfficialGuideline, self.official.as_slice()));
        out.extend(tagged(RegulationSource::Supplementary, self.supplementary.as_slice()));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// JSON file holding one action object or an array of actions; `-` reads stdin.
    pub input: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[arg(long, value_parser = parse_source)]
    pub source: Option<RegulationSource>,
    #[arg(long)]
    pub limit: Option<usize>,
}

fn parse_source(raw: &str) -> Result<RegulationSource, String> {
    RegulationSource::parse(raw).map_err(|err| err.to_string())
}
