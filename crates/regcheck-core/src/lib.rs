// Public fallible APIs in this crate share one concrete error contract (`RegcheckError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod checker;
pub mod client;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub(crate) mod jsonl;
pub mod knowledge;
pub mod maintenance;
pub mod models;
pub mod report;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use checker::ComplianceChecker;
pub use client::Regcheck;
pub use error::{RegcheckError, Result};
pub use knowledge::KnowledgeBase;
