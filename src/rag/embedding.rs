//! Text embeddings for policy retrieval

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};

/// Turns text into a fixed-width vector for similarity search
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimensions(&self) -> usize;
}

/// Deterministic hashed bag-of-words embedder.
///
/// Each lower-cased ASCII alphanumeric token votes into 12 buckets chosen
/// by its SHA-256 digest. The result is L2-normalized; text with no tokens
/// embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

const VOTES_PER_TOKEN: usize = 12;

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::Config(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            for i in 0..VOTES_PER_TOKEN {
                let index = digest[i] as usize % self.dimensions;
                let sign = if digest[i + VOTES_PER_TOKEN] % 2 == 0 {
                    1.0
                } else {
                    -1.0
                };
                vector[index] += sign;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity in [-1, 1]; 0 when either side is a zero vector or
/// the widths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(HashEmbedder::new(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let e = HashEmbedder::new(96).unwrap();
        let a = e.embed("Refund within 14 days");
        let b = e.embed("refund WITHIN 14 days!");
        assert_eq!(a.len(), 96);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8).unwrap();
        assert!(e.embed("  ... ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_related_text_scores_higher() {
        let e = HashEmbedder::new(96).unwrap();
        let query = e.embed("late delivery refund");
        let close = e.embed("refund policy for late delivery of parcels");
        let far = e.embed("loyalty tier vouchers birthday gift");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_cosine_edges() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
        assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&v, &[1.0]), 0.0);
    }
}
