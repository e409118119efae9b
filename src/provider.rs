//! The scoring-provider contract.
//!
//! Lexical, dense, late-interaction and cross-encoder scorers are all
//! injected capabilities behind small traits, so a real index or neural
//! model can replace the built-in deterministic providers without
//! touching cascade or fusion logic.
//!
//! Contract for every provider: an empty chunk set yields an empty
//! result; scores are finite; identical (query, chunks) inputs yield
//! identical scores on repeated calls; a call never mutates the corpus
//! or any shared state.

use crate::{corpus::Chunk, error::Result};

/// Fallback score when per-candidate scoring exhausts its retry budget.
/// Midpoint of [0,1], matching the degenerate calibration convention.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// A provider's score for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderScore {
    pub chunk_id: String,
    pub score: f32,
}

/// Batch scoring capability: score a set of chunks against a query.
///
/// Implementations may return fewer entries than chunks given (chunks a
/// signal has nothing to say about are simply absent), but never more,
/// and never a duplicate chunk_id.
pub trait ScoringProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, query: &str, chunks: &[Chunk])
    -> Result<Vec<ProviderScore>>;
}

/// Run a fallible per-candidate scoring call with one bounded retry,
/// falling back to `neutral` rather than aborting the batch.
///
/// Returns the value and whether the fallback was used.
pub(crate) fn score_with_retry<T>(
    provider: &'static str,
    chunk_id: &str,
    neutral: T,
    attempt: impl Fn() -> Result<T>,
) -> (T, bool) {
    match attempt() {
        Ok(value) => (value, false),
        Err(first) => {
            tracing::warn!(
                provider,
                chunk_id,
                "scoring failed, retrying: {first}"
            );
            match attempt() {
                Ok(value) => (value, false),
                Err(second) => {
                    tracing::warn!(
                        provider,
                        chunk_id,
                        "scoring failed twice, using neutral score: {second}"
                    );
                    (neutral, true)
                }
            }
        }
    }
}
