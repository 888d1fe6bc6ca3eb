use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RegcheckError, Result};

pub const EMBED_DIM: usize = 64;
pub const EMBEDDER_ENV: &str = "REGCHECK_EMBEDDER";
pub const EMBEDDER_ENDPOINT_ENV: &str = "REGCHECK_EMBEDDER_ENDPOINT";
pub const EMBEDDER_MODEL_ENV: &str = "REGCHECK_EMBEDDER_MODEL";
pub const EMBEDDER_FALLBACK_MODEL_ENV: &str = "REGCHECK_EMBEDDER_FALLBACK_MODEL";
pub const EMBEDDER_TIMEOUT_MS_ENV: &str = "REGCHECK_EMBEDDER_TIMEOUT_MS";
pub const EMBEDDER_STRICT_ENV: &str = "REGCHECK_EMBEDDER_STRICT";

pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_FALLBACK_MODEL_NAME: &str = "paraphrase-MiniLM-L6-v2";
pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 5_000;

const MODEL_PROBE_TEXT: &str = "reactor coolant pump seal inspection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    SemanticLite,
    Hash,
    Model,
}

impl EmbedderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SemanticLite => "semantic-lite",
            Self::Hash => "hash",
            Self::Model => "model",
        }
    }
}

pub fn resolve_embedder_kind(raw: Option<&str>) -> EmbedderKind {
    match raw.map(|value| value.trim().to_ascii_lowercase()) {
        Some(value) if value == "semantic" || value == "semantic-lite" => {
            EmbedderKind::SemanticLite
        }
        Some(value) if value == "hash" || value == "deterministic" => EmbedderKind::Hash,
        Some(value) if value == "model" || value == "endpoint" => EmbedderKind::Model,
        _ => EmbedderKind::SemanticLite,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProfile {
    pub provider: String,
    pub vector_version: String,
    pub dim: usize,
}

/// Maps free text to a fixed-dimension vector.
///
/// Implementations may block (remote model calls); callers must not hold
/// store locks across `embed`.
pub trait Embedder: Send + Sync {
    fn provider(&self) -> &str;
    fn vector_version(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn profile(&self) -> EmbeddingProfile {
        EmbeddingProfile {
            provider: self.provider().to_string(),
            vector_version: self.vector_version().to_string(),
            dim: self.dimension(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn provider(&self) -> &str {
        "hash"
    }

    fn vector_version(&self) -> &str {
        "hash-v1"
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; EMBED_DIM];
        for token in tokenize_vec(text) {
            accumulate_feature(&mut vec, &token, 1.0);
        }
        normalize_vector(&mut vec);
        Ok(vec)
    }
}

#[derive(Debug, Default)]
pub struct SemanticLiteEmbedder;

impl Embedder for SemanticLiteEmbedder {
    fn provider(&self) -> &str {
        "semantic-lite"
    }

    fn vector_version(&self) -> &str {
        "semantic-lite-v2"
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; EMBED_DIM];
        let tokens = tokenize_vec(text)
            .into_iter()
            .map(|token| canonicalize_semantic_token(&token))
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();

        for token in &tokens {
            accumulate_feature(&mut vec, token, 1.0);
            for trigram in char_ngrams(token, 3) {
                accumulate_feature(&mut vec, &format!("tri:{trigram}"), 0.35);
            }
        }

        for pair in tokens.windows(2) {
            let feature = format!("bi:{}_{}", pair[0], pair[1]);
            accumulate_feature(&mut vec, &feature, 0.8);
        }

        normalize_vector(&mut vec);
        Ok(vec)
    }
}

#[derive(Debug, Serialize)]
struct ModelEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelEmbedResponse {
    Single { embedding: Vec<f32> },
    Batched { data: Vec<ModelEmbedItem> },
}

#[derive(Debug, Deserialize)]
struct ModelEmbedItem {
    embedding: Vec<f32>,
}

impl ModelEmbedResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Single { embedding } => Some(embedding),
            Self::Batched { data } => data.into_iter().next().map(|item| item.embedding),
        }
    }
}

/// Sentence-embedding model served over HTTP.
#[derive(Debug)]
pub struct ModelEndpointEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    vector_version: String,
    dim: usize,
}

impl ModelEndpointEmbedder {
    /// Connects to `endpoint` and probes `model` once to learn its dimension.
    pub fn connect(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(RegcheckError::Validation(
                "embedding endpoint must not be empty".to_string(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let mut embedder = Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            vector_version: format!("model:{model}"),
            dim: 0,
        };
        let probe = embedder.request(MODEL_PROBE_TEXT)?;
        if probe.is_empty() {
            return Err(RegcheckError::Embedding(format!(
                "model {model} returned an empty probe vector"
            )));
        }
        embedder.dim = probe.len();
        Ok(embedder)
    }

    fn request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ModelEmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()?
            .error_for_status()?;
        response
            .json::<ModelEmbedResponse>()?
            .into_vector()
            .ok_or_else(|| {
                RegcheckError::Embedding(format!("model {} returned no embedding", self.model))
            })
    }
}

impl Embedder for ModelEndpointEmbedder {
    fn provider(&self) -> &str {
        &self.model
    }

    fn vector_version(&self) -> &str {
        &self.vector_version
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.request(text)?;
        if vector.len() != self.dim {
            return Err(RegcheckError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(RegcheckError::Embedding(format!(
                "model {} returned non-finite values",
                self.model
            )));
        }
        Ok(vector)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedderRuntimeConfig {
    pub kind: Option<String>,
    pub model_endpoint: Option<String>,
    pub model_name: Option<String>,
    pub fallback_model_name: Option<String>,
    pub model_timeout_ms: Option<u64>,
    pub strict: bool,
}

/// Builds the configured embedder.
///
/// The model embedder tries the primary model, then the fallback model; when
/// both fail and `strict` is off, the local semantic-lite embedder is used.
pub fn build_embedder(config: &EmbedderRuntimeConfig) -> Result<Arc<dyn Embedder>> {
    match resolve_embedder_kind(config.kind.as_deref()) {
        EmbedderKind::SemanticLite => Ok(Arc::new(SemanticLiteEmbedder)),
        EmbedderKind::Hash => Ok(Arc::new(HashEmbedder)),
        EmbedderKind::Model => build_model_embedder(config),
    }
}

fn build_model_embedder(config: &EmbedderRuntimeConfig) -> Result<Arc<dyn Embedder>> {
    let Some(endpoint) = config.model_endpoint.as_deref() else {
        return local_fallback(
            config.strict,
            RegcheckError::Validation(format!(
                "{EMBEDDER_ENDPOINT_ENV} is required for the model embedder"
            )),
        );
    };
    let timeout = Duration::from_millis(config.model_timeout_ms.unwrap_or(DEFAULT_MODEL_TIMEOUT_MS));
    let primary = config.model_name.as_deref().unwrap_or(DEFAULT_MODEL_NAME);
    let fallback = config
        .fallback_model_name
        .as_deref()
        .unwrap_or(DEFAULT_FALLBACK_MODEL_NAME);

    let primary_err = match ModelEndpointEmbedder::connect(endpoint, primary, timeout) {
        Ok(embedder) => {
            info!(model = primary, dim = embedder.dimension(), "embedding model ready");
            return Ok(Arc::new(embedder));
        }
        Err(err) => err,
    };
    warn!(model = primary, error = %primary_err, fallback, "embedding model unavailable; trying fallback");
    if fallback != primary {
        match ModelEndpointEmbedder::connect(endpoint, fallback, timeout) {
            Ok(embedder) => {
                info!(model = fallback, dim = embedder.dimension(), "fallback embedding model ready");
                return Ok(Arc::new(embedder));
            }
            Err(err) => return local_fallback(config.strict, err),
        }
    }
    local_fallback(config.strict, primary_err)
}

fn local_fallback(strict: bool, err: RegcheckError) -> Result<Arc<dyn Embedder>> {
    if strict {
        return Err(err);
    }
    warn!(error = %err, "falling back to semantic-lite embedder");
    Ok(Arc::new(SemanticLiteEmbedder))
}

fn tokenize_vec(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

fn accumulate_feature(vec: &mut [f32], feature: &str, weight: f32) {
    let hash = blake3::hash(feature.as_bytes());
    let bytes = hash.as_bytes();
    let idx = ((bytes[0] as usize) << 8 | bytes[1] as usize) % vec.len();
    vec[idx] += weight;
}

fn normalize_vector(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec {
            *value /= norm;
        }
    }
}

fn canonicalize_semantic_token(token: &str) -> String {
    let normalized = token.trim();
    if normalized.is_empty() {
        return String::new();
    }

    let canonical = match normalized {
        "inspect" | "inspection" | "inspected" | "examine" | "examination" | "survey"
        | "walkdown" | "surveillance" => "inspection",
        "test" | "tests" | "testing" | "verify" | "verification" | "calibrate"
        | "calibration" => "testing",
        "replace" | "replacement" | "swap" | "renew" | "install" | "installation" => {
            "replacement"
        }
        "repair" | "fix" | "rework" | "refurbish" | "overhaul" => "repair",
        "pump" | "pumps" | "impeller" | "rcp" => "pump",
        "valve" | "valves" | "actuator" | "msiv" | "porv" => "valve",
        "seal" | "seals" | "gasket" | "packing" | "oring" => "seal",
        "coolant" | "cooling" | "rcs" | "feedwater" | "chiller" => "coolant",
        "reactor" | "core" | "vessel" | "rpv" => "reactor",
        "radiation" | "radiological" | "dose" | "contamination" | "alara" => "radiation",
        "nrc" | "regulation" | "regulatory" | "cfr" | "license" | "licensee" => "regulation",
        "weld" | "welding" | "welded" | "brazing" => "weld",
        _ => normalized,
    };

    stem_suffix(canonical)
}

fn stem_suffix(token: &str) -> String {
    if token.len() <= 4 {
        return token.to_string();
    }

    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix)
            && stripped.len() >= 3
        {
            return stripped.to_string();
        }
    }

    token.to_string()
}

fn char_ngrams(token: &str, n: usize) -> Vec<String> {
    if token.chars().count() < n {
        return vec![token.to_string()];
    }

    let chars = token.chars().collect::<Vec<_>>();
    let mut out = Vec::new();
    for i in 0..=chars.len() - n {
        out.push(chars[i..i + n].iter().collect());
    }
    out
}
