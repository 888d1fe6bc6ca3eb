use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod args;

#[cfg(test)]
mod tests;

pub use args::{CheckArgs, IngestArgs, OutputFormat, RulesArgs};

#[derive(Debug, Parser)]
#[command(name = "regcheck")]
#[command(about = "Regulatory compliance checks for nuclear maintenance actions", version)]
pub struct Cli {
    #[arg(long, default_value = ".regcheck", global = true)]
    pub root: PathBuf,

    /// Enable verbose logging. Repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the workspace state database.
    Init,
    /// Load regulation corpora into the knowledge base.
    Ingest(IngestArgs),
    /// Show knowledge base and checker settings.
    Status,
    /// Check one maintenance action or a batch of them.
    Check(CheckArgs),
    /// List ingested rules.
    Rules(RulesArgs),
}

impl Commands {
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ingest(_) => "ingest",
            Self::Status => "status",
            Self::Check(_) => "check",
            Self::Rules(_) => "rules",
        }
    }
}
