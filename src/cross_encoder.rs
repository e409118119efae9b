//! Cross-encoder scoring: joint query/chunk relevance for the Judge.
//!
//! The reference scorer combines an exact-term-match weight with a
//! bounded character-overlap similarity term, capped at 1.0. A real
//! cross-encoder model slots in behind [`PairScorer`].

use crate::{
    config::CrossEncoderConfig,
    corpus::Chunk,
    error::Result,
    provider::{ProviderScore, ScoringProvider},
    text_util::{char_jaccard, tokenize},
};

/// Query/chunk pair scoring capability, the seam the Judge scores
/// through.
pub trait PairScorer: Send + Sync {
    /// Relevance of `text` to `query`, in [0,1].
    fn score_pair(&self, query: &str, text: &str) -> Result<f32>;
}

pub struct CrossEncoderProvider {
    term_match_weight: f32,
    overlap_weight: f32,
}

impl CrossEncoderProvider {
    pub fn new(config: &CrossEncoderConfig) -> Self {
        Self {
            term_match_weight: config.term_match_weight,
            overlap_weight: config.overlap_weight,
        }
    }
}

impl PairScorer for CrossEncoderProvider {
    fn score_pair(&self, query: &str, text: &str) -> Result<f32> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(0.0);
        }

        let text_lower = text.to_lowercase();
        let chunk_words = tokenize(text);

        let mut score = 0.0;

        // Exact term matches against the raw chunk text.
        for term in &query_terms {
            if text_lower.contains(term.as_str()) {
                score += self.term_match_weight;
            }
        }

        // Character-overlap similarity over significant token pairs.
        for term in &query_terms {
            if term.len() <= 2 {
                continue;
            }
            for word in &chunk_words {
                if word.len() <= 2 {
                    continue;
                }
                score += char_jaccard(term, word) * self.overlap_weight;
            }
        }

        Ok(score.min(1.0))
    }
}

impl ScoringProvider for CrossEncoderProvider {
    fn name(&self) -> &'static str {
        "cross_encoder"
    }

    fn score(
        &self,
        query: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<ProviderScore>> {
        chunks
            .iter()
            .map(|chunk| {
                Ok(ProviderScore {
                    chunk_id: chunk.chunk_id.clone(),
                    score: self.score_pair(query, &chunk.text)?,
                })
            })
            .collect()
    }
}
