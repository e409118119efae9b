//! Late-interaction scoring: token-level query/chunk comparison.
//!
//! For every query term, each chunk token it interacts with contributes
//! an interaction strength; the per-term strengths are summed, averaged
//! over the query terms, and capped at 1.0. The strongest interactions
//! are retained as optional evidence for the Inspector's output.

use serde::{Deserialize, Serialize};

use crate::{
    config::LateInteractionConfig,
    corpus::Chunk,
    error::Result,
    provider::{ProviderScore, ScoringProvider},
    text_util::tokenize,
};

/// Maximum number of token-level evidence entries retained per chunk.
pub const MAX_EVIDENCE: usize = 10;

/// One token-level interaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvidence {
    pub token: String,
    pub weight: f32,
    pub pos: usize,
}

/// Per-chunk late-interaction capability, the seam the Inspector scores
/// through.
pub trait InteractionScorer: Send + Sync {
    fn score_chunk(
        &self,
        query: &str,
        text: &str,
    ) -> Result<(f32, Vec<InteractionEvidence>)>;
}

pub struct LateInteractionProvider {
    max_len: usize,
}

impl LateInteractionProvider {
    pub fn new(config: &LateInteractionConfig) -> Self {
        Self {
            max_len: config.max_len.max(1),
        }
    }
}

/// Interaction strength between a query term and a chunk token, or None
/// when they do not interact.
///
/// Containment (either direction) interacts with strength
/// 0.3 + 0.2 · (shorter / longer), so an exact match scores 0.5 and a
/// marginal substring match approaches 0.3.
fn interaction_strength(term: &str, token: &str) -> Option<f32> {
    if !token.contains(term) && !term.contains(token) {
        return None;
    }

    let (shorter, longer) = if term.len() <= token.len() {
        (term.len() as f32, token.len() as f32)
    } else {
        (token.len() as f32, term.len() as f32)
    };

    Some(0.3 + 0.2 * (shorter / longer))
}

impl InteractionScorer for LateInteractionProvider {
    fn score_chunk(
        &self,
        query: &str,
        text: &str,
    ) -> Result<(f32, Vec<InteractionEvidence>)> {
        let query_terms = tokenize(query);
        // A zero-length query scores 0 by definition.
        if query_terms.is_empty() {
            return Ok((0.0, Vec::new()));
        }

        let mut chunk_tokens = tokenize(text);
        chunk_tokens.truncate(self.max_len);

        let mut total = 0.0;
        let mut evidence = Vec::new();

        for term in &query_terms {
            for (pos, token) in chunk_tokens.iter().enumerate() {
                if let Some(weight) = interaction_strength(term, token) {
                    total += weight;
                    evidence.push(InteractionEvidence {
                        token: token.clone(),
                        weight,
                        pos,
                    });
                }
            }
        }

        let score = (total / query_terms.len() as f32).min(1.0);

        evidence.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pos.cmp(&b.pos))
        });
        evidence.truncate(MAX_EVIDENCE);

        Ok((score, evidence))
    }
}

impl ScoringProvider for LateInteractionProvider {
    fn name(&self) -> &'static str {
        "late_interaction"
    }

    fn score(
        &self,
        query: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<ProviderScore>> {
        chunks
            .iter()
            .map(|chunk| {
                let (score, _evidence) =
                    self.score_chunk(query, &chunk.text)?;
                Ok(ProviderScore {
                    chunk_id: chunk.chunk_id.clone(),
                    score,
                })
            })
            .collect()
    }
}
