//! Embedding model interface
//!
//! The production deployment plugs an external model in behind
//! [`EmbeddingModel`]. [`HashEmbedder`] is the in-process implementation used
//! by tests and local development: fully deterministic token-hash projection,
//! so the same text always maps to the same vector and overlapping texts
//! land near each other.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::{EngramError, Result};
use crate::sector::Sector;
use crate::vecmath;

/// Default dimensions per sector for the in-process embedder
pub const DEFAULT_DIMENSIONS: usize = 256;

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// A black-box embedding model
///
/// Implementations must be deterministic per (text, sector) for the engine's
/// retrieval determinism guarantee to hold end-to-end.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Stable identifier; part of the gateway cache key
    fn model_id(&self) -> &str;

    /// Output dimension for a sector (sectors may differ)
    fn dimensions(&self, sector: Sector) -> usize;

    /// Embed one text into one sector's subspace
    async fn embed(&self, text: &str, sector: Sector) -> Result<Vec<f32>>;
}

// ============================================================================
// HASH EMBEDDER
// ============================================================================

/// Deterministic token-hash embedding
///
/// Each whitespace token is hashed into a bucket of the output vector,
/// salted by the sector, then the vector is L2-normalized. Not a semantic
/// model; it preserves exactly the properties the engine needs from one:
/// determinism, unit scale, and token-overlap similarity.
pub struct HashEmbedder {
    dimensions: HashMap<Sector, usize>,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashEmbedder {
    /// Create with a uniform dimension across sectors
    pub fn new(dimensions: usize) -> Self {
        let dimensions = Sector::all().iter().map(|s| (*s, dimensions)).collect();
        Self { dimensions }
    }

    /// Create with explicit per-sector dimensions
    pub fn with_dimensions(dimensions: HashMap<Sector, usize>) -> Self {
        Self { dimensions }
    }

    fn bucket(token: &str, sector: Sector, dim: usize) -> (usize, f32) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        sector.index().hash(&mut hasher);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % dim as u64) as usize;
        // Sign from a high bit keeps buckets from all pointing one way
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    fn model_id(&self) -> &str {
        "engram-hash-v1"
    }

    fn dimensions(&self, sector: Sector) -> usize {
        self.dimensions
            .get(&sector)
            .copied()
            .unwrap_or(DEFAULT_DIMENSIONS)
    }

    async fn embed(&self, text: &str, sector: Sector) -> Result<Vec<f32>> {
        let dim = self.dimensions(sector);
        let mut vector = vec![0.0f32; dim];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let (idx, sign) = Self::bucket(&token, sector, dim);
            vector[idx] += sign;
        }
        vecmath::normalize(&mut vector);
        if vector.iter().all(|x| *x == 0.0) {
            // All-zero means no tokens survived; callers validate earlier
            return Err(EngramError::EmptyText);
        }
        Ok(vector)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let model = HashEmbedder::default();
        let a = model.embed("the quick brown fox", Sector::Semantic).await.unwrap();
        let b = model.embed("the quick brown fox", Sector::Semantic).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_sectors_produce_distinct_vectors() {
        let model = HashEmbedder::default();
        let sem = model.embed("shared text", Sector::Semantic).await.unwrap();
        let epi = model.embed("shared text", Sector::Episodic).await.unwrap();
        assert_ne!(sem, epi);
    }

    #[tokio::test]
    async fn test_overlap_beats_disjoint() {
        let model = HashEmbedder::default();
        let base = model
            .embed("rust memory safety ownership", Sector::Semantic)
            .await
            .unwrap();
        let near = model
            .embed("rust memory safety borrowing", Sector::Semantic)
            .await
            .unwrap();
        let far = model
            .embed("pasta recipe tomato basil", Sector::Semantic)
            .await
            .unwrap();
        let sim_near = crate::vecmath::cosine(&base, &near).unwrap();
        let sim_far = crate::vecmath::cosine(&base, &far).unwrap();
        assert!(sim_near > sim_far);
    }

    #[tokio::test]
    async fn test_output_is_normalized() {
        let model = HashEmbedder::default();
        let v = model.embed("normalize me please", Sector::Reflective).await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_per_sector_dimensions() {
        let mut dims = HashMap::new();
        for s in Sector::all() {
            dims.insert(s, 64);
        }
        dims.insert(Sector::Emotional, 32);
        let model = HashEmbedder::with_dimensions(dims);
        assert_eq!(
            model.embed("a b c", Sector::Semantic).await.unwrap().len(),
            64
        );
        assert_eq!(
            model.embed("a b c", Sector::Emotional).await.unwrap().len(),
            32
        );
    }
}
