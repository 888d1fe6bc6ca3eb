use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RegcheckError>;

#[derive(Debug, Error)]
pub enum RegcheckError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("corpus {corpus} failed to load: {reason}")]
    Corpus { corpus: String, reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RegcheckError {
    pub fn mutex_poisoned(label: &str) -> Self {
        Self::Internal(format!("{label} lock poisoned"))
    }

    pub fn corpus(corpus: impl Into<String>, reason: impl ToString) -> Self {
        Self::Corpus {
            corpus: corpus.into(),
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Embedding(_) => "EMBEDDING_FAILED",
            Self::Corpus { .. } => "CORPUS_LOAD_FAILED",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>) -> ErrorPayload {
        let details = match self {
            Self::Corpus { corpus, .. } => Some(serde_json::json!({ "corpus": corpus })),
            Self::DimensionMismatch { expected, actual } => Some(serde_json::json!({
                "expected": expected,
                "actual": actual,
            })),
            _ => None,
        };
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            details,
        }
    }
}
