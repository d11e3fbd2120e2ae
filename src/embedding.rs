//! Text embedding abstraction for the semantic cache.
//!
//! The cache relies only on the similarity threshold and the exactness
//! of the cosine math; embedding quality is the provider's problem.
//! Any real implementation must produce unit-L2 vectors of a fixed
//! dimensionality.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::Result;

/// Produce fixed-dimension unit vectors from text.
///
/// Implementations must be `Send + Sync`; the executor calls `embed`
/// from dispatcher workers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector of `dimensions()` floats.
    ///
    /// The returned vector need not be normalized; the cache
    /// L2-normalizes before storing or comparing.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The dimensionality of vectors produced by this embedder.
    fn dimensions(&self) -> usize;

    /// A human-readable name for logging.
    fn name(&self) -> &str;
}

/// Compute the cosine similarity between two vectors.
///
/// Returns a value in \[-1.0, 1.0\], or `0.0` for mismatched lengths or
/// zero-magnitude inputs.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut mag_a = 0.0_f32;
    let mut mag_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag < f32::EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x /= mag;
    }
}

/// Deterministic hashed bag-of-words embedder.
///
/// PLACEHOLDER: this exists so the semantic cache is exercisable without
/// a model dependency. Token hashes pick buckets, counts fill them, and
/// the result is unit-normalized. Identical texts map to identical
/// vectors, but similarity between different texts is crude. Production
/// deployments should plug in a real [`Embedder`].
pub struct HashedBowEmbedder {
    dims: usize,
}

impl HashedBowEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl Default for HashedBowEmbedder {
    fn default() -> Self {
        Self::new(128)
    }
}

#[async_trait]
impl Embedder for HashedBowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0_f32; self.dims];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        l2_normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "hashed-bow"
    }
}
