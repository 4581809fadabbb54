//! Vector Math & Similarity
//!
//! Shared primitives for cosine similarity, normalization, and top-k
//! selection. Dimensions are fixed per sector but may differ across sectors,
//! so every binary operation validates dimensions at the call site.

use crate::error::{EngramError, Result};

/// Validate that a vector is finite and non-empty
pub fn validate(v: &[f32]) -> Result<()> {
    if v.is_empty() {
        return Err(EngramError::InvalidVector("empty vector".to_string()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(EngramError::InvalidVector(
            "non-finite component".to_string(),
        ));
    }
    Ok(())
}

fn validate_pair(a: &[f32], b: &[f32]) -> Result<()> {
    validate(a)?;
    validate(b)?;
    if a.len() != b.len() {
        return Err(EngramError::InvalidVector(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// Dot product of two same-dimension vectors
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    validate_pair(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Cosine similarity in [-1, 1]
///
/// Zero-magnitude vectors yield 0.0, never NaN.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32> {
    validate_pair(a, b)?;
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(sim.clamp(-1.0, 1.0))
}

/// Normalize a vector to unit length in place
///
/// Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Top-k candidates by cosine similarity to the query
///
/// Deterministic: ties are broken by ascending id. Candidates with invalid
/// vectors fail the whole call rather than being silently skipped.
pub fn topk_cosine(
    query: &[f32],
    candidates: &[(String, Vec<f32>)],
    k: usize,
) -> Result<Vec<(String, f32)>> {
    validate(query)?;
    let mut scored: Vec<(String, f32)> = Vec::with_capacity(candidates.len());
    for (id, vec) in candidates {
        let sim = cosine(query, vec)?;
        scored.push((id.clone(), sim));
    }
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    Ok(scored)
}

/// Encode a vector as little-endian f32 bytes for blob storage
pub fn to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a vector from little-endian f32 bytes
pub fn from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![0.5, 0.5, 0.5];
        let sim = cosine(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine(&a, &b).unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero_not_nan() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            cosine(&a, &b),
            Err(EngramError::InvalidVector(_))
        ));
    }

    #[test]
    fn test_nan_rejected() {
        let a = vec![1.0, f32::NAN];
        let b = vec![1.0, 1.0];
        assert!(cosine(&a, &b).is_err());
        assert!(dot(&a, &b).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_topk_orders_and_truncates() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            ("c".to_string(), vec![0.0, 1.0]),
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![1.0, 1.0]),
        ];
        let top = topk_cosine(&query, &candidates, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "a");
        assert_eq!(top[1].0, "b");
    }

    #[test]
    fn test_topk_ties_break_by_ascending_id() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            ("b".to_string(), vec![2.0, 0.0]),
            ("a".to_string(), vec![1.0, 0.0]),
        ];
        let top = topk_cosine(&query, &candidates, 2).unwrap();
        // Both have similarity 1.0; "a" sorts first
        assert_eq!(top[0].0, "a");
        assert_eq!(top[1].0, "b");
    }

    #[test]
    fn test_bytes_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.75];
        let bytes = to_bytes(&v);
        assert_eq!(from_bytes(&bytes), Some(v));
        assert_eq!(from_bytes(&[1, 2, 3]), None);
    }
}
