mod compliance;
mod ingest;
mod regulation;

pub use compliance::{
    BatchVerdict, ComplianceDetail, ComplianceVerdict, ComplianceWarning, MaintenanceAction,
    STATUS_COMPLIANT, STATUS_NON_COMPLIANT, status_label,
};
pub use ingest::{BootstrapReport, CorpusOutcome, IngestFailure, IngestReport};
pub use regulation::{
    ComplianceRule, DEFAULT_CATEGORY, RegulationRecord, RegulationSource, RuleEmbedding,
};
