//! Dense scoring provider.
//!
//! The reference encoder is a hashed bag-of-tokens embedding: every token
//! is bucketed by its blake3 digest into a fixed-dimension vector, which
//! is then L2-normalized. Chunk relevance is the cosine against the query
//! embedding. Deliberately simple, fully deterministic, and swappable for
//! a real encoder behind [`ScoringProvider`].

use std::cmp::Ordering;

use crate::{
    config::DenseConfig,
    corpus::Chunk,
    error::Result,
    provider::{ProviderScore, ScoringProvider},
    text_util::tokenize,
};

pub struct DenseProvider {
    dim: usize,
    limit: usize,
}

impl DenseProvider {
    pub fn new(config: &DenseConfig, limit: usize) -> Self {
        Self {
            dim: config.dim.max(1),
            limit,
        }
    }

    /// Embed text as an L2-normalized hashed token-count vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            vector[token_bucket(&token, self.dim)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        vector
    }
}

fn token_bucket(token: &str, dim: usize) -> usize {
    let digest = blake3::hash(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % dim as u64) as usize
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl ScoringProvider for DenseProvider {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn score(
        &self,
        query: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<ProviderScore>> {
        let query_embedding = self.embed(query);
        if chunks.is_empty() || query_embedding.iter().all(|x| *x == 0.0) {
            return Ok(Vec::new());
        }

        let mut results: Vec<ProviderScore> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = dot(&query_embedding, &self.embed(&chunk.text));
                (score > 0.0).then(|| ProviderScore {
                    chunk_id: chunk.chunk_id.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        results.truncate(self.limit);

        Ok(results)
    }
}
