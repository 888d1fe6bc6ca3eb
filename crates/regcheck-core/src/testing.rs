use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::Embedder;
use crate::error::{RegcheckError, Result};

/// Maps exact texts to exact vectors; unknown texts embed to the zero vector.
#[derive(Debug, Default)]
pub(crate) struct FixtureEmbedder {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FixtureEmbedder {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dim, "fixture vector dimension");
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for FixtureEmbedder {
    fn provider(&self) -> &str {
        "fixture"
    }

    fn vector_version(&self) -> &str {
        "fixture-v1"
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(text) {
            return Err(RegcheckError::Embedding(format!("fixture refused: {text}")));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dim]))
    }
}

/// Unit vector in the plane of the first two axes with the given cosine to `[1, 0, ..]`.
pub(crate) fn at_cosine(dim: usize, cosine: f32) -> Vec<f32> {
    let mut vector = vec![0.0; dim];
    vector[0] = cosine;
    vector[1] = (1.0 - cosine * cosine).max(0.0).sqrt();
    vector
}

pub(crate) fn axis(dim: usize, index: usize) -> Vec<f32> {
    let mut vector = vec![0.0; dim];
    vector[index] = 1.0;
    vector
}
