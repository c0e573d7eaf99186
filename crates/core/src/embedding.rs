use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Turns text into a fixed-length vector. Implementations must be deterministic
/// for a given configuration and return vectors of length [`Vectorizer::dimensions`].
pub trait Vectorizer: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn vectorize(&self, text: &str) -> Result<Vec<f32>>;

    fn vectorize_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        inputs.iter().map(|text| self.vectorize(text)).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HashVectorizerConfig {
    pub dimensions: usize,
    pub max_tokens: usize,
}

impl Default for HashVectorizerConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            max_tokens: 100,
        }
    }
}

/// Placeholder embedding: a position-weighted bag of hashed tokens.
///
/// Each of the first `max_tokens` whitespace tokens adds `1 / (position + 1)`
/// to its bucket, then the vector is L2-normalized. Buckets come from blake3 so
/// persisted vectors stay comparable across builds.
#[derive(Debug, Clone)]
pub struct HashVectorizer {
    config: HashVectorizerConfig,
}

impl HashVectorizer {
    pub fn new(config: HashVectorizerConfig) -> Self {
        Self { config }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let dims = self.config.dimensions.max(1);
        let mut vector = vec![0f32; dims];
        for (position, token) in text
            .split_whitespace()
            .take(self.config.max_tokens)
            .enumerate()
        {
            let bucket = self.bucket_for(token);
            vector[bucket] += 1.0 / (position as f32 + 1.0);
        }
        normalize(&mut vector);
        vector
    }

    fn bucket_for(&self, token: &str) -> usize {
        let digest = blake3::hash(token.to_lowercase().as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(head) % self.config.dimensions.max(1) as u64) as usize
    }
}

impl Default for HashVectorizer {
    fn default() -> Self {
        Self::new(HashVectorizerConfig::default())
    }
}

impl Vectorizer for HashVectorizer {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions.max(1)
    }

    fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut a_norm = 0.0f64;
    let mut b_norm = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

pub fn ensure_dimensions(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(CoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
