use crate::embedding::{
    EMBEDDER_ENDPOINT_ENV, EMBEDDER_ENV, EMBEDDER_FALLBACK_MODEL_ENV, EMBEDDER_MODEL_ENV,
    EMBEDDER_STRICT_ENV, EMBEDDER_TIMEOUT_MS_ENV, EmbedderRuntimeConfig,
};
use crate::error::Result;

mod checker;
mod env;

pub use checker::{
    CheckerConfig, DEFAULT_HIGH_CONFIDENCE_CUTOFF, DEFAULT_RETRIEVAL_K,
    DEFAULT_SIMILARITY_THRESHOLD,
};

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub embedding: EmbedderRuntimeConfig,
    pub checker: CheckerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            embedding: EmbedderRuntimeConfig::from_env(),
            checker: CheckerConfig::from_env()?,
        })
    }
}

impl EmbedderRuntimeConfig {
    #[must_use]
    fn from_env() -> Self {
        Self {
            kind: env::read_non_empty_env(EMBEDDER_ENV),
            model_endpoint: env::read_non_empty_env(EMBEDDER_ENDPOINT_ENV),
            model_name: env::read_non_empty_env(EMBEDDER_MODEL_ENV),
            fallback_model_name: env::read_non_empty_env(EMBEDDER_FALLBACK_MODEL_ENV),
            model_timeout_ms: env::read_env_u64(EMBEDDER_TIMEOUT_MS_ENV),
            strict: env::parse_env_bool(std::env::var(EMBEDDER_STRICT_ENV).ok().as_deref()),
        }
    }
}
