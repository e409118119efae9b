//! Score normalization and two-signal fusion for the Scout merge.

use std::{cmp::Ordering, collections::BTreeMap};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    provider::ProviderScore,
};

/// Min-max scaling onto [0,1].
///
/// The degenerate case (every value equal, including a single-element
/// list) maps each value to 0.5, so a signal with no discriminating
/// information biases a fused rank toward neither extreme. Empty input
/// yields empty output.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if max == min {
        return vec![0.5; scores.len()];
    }

    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Signal weights for fusion. Weights need not sum to 1; no
/// renormalization is performed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub w_bm25: f32,
    pub w_dense: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            w_bm25: 0.5,
            w_dense: 0.5,
        }
    }
}

/// Recognized fusion methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMethod {
    WeightedSum,
}

impl FusionMethod {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "weighted_sum" => Ok(Self::WeightedSum),
            other => Err(Error::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Fuse two equal-length score lists into one ranking score list.
///
/// Both inputs are normalized independently, then combined elementwise
/// under the given weights.
pub fn fuse(
    bm25_scores: &[f32],
    dense_scores: &[f32],
    method: FusionMethod,
    weights: FusionWeights,
) -> Result<Vec<f32>> {
    if bm25_scores.len() != dense_scores.len() {
        return Err(Error::ShapeMismatch {
            left: bm25_scores.len(),
            right: dense_scores.len(),
        });
    }

    let norm_bm25 = normalize(bm25_scores);
    let norm_dense = normalize(dense_scores);

    match method {
        FusionMethod::WeightedSum => Ok(norm_bm25
            .iter()
            .zip(&norm_dense)
            .map(|(b, d)| weights.w_bm25 * b + weights.w_dense * d)
            .collect()),
    }
}

/// A merged Scout candidate carrying both raw signals and the fused score.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCandidate {
    pub chunk_id: String,
    pub s_bm25: f32,
    pub s_dense: f32,
    pub fusion_score: f32,
}

/// Union two provider result lists keyed by chunk_id, fuse, rank, and
/// truncate to the first `k` entries.
///
/// A chunk_id present in only one list gets 0.0 for the missing signal
/// before normalization. Ranking is fused-score descending with a
/// chunk_id-ascending tie-break.
pub fn merge(
    bm25_results: &[ProviderScore],
    dense_results: &[ProviderScore],
    k: usize,
    method: FusionMethod,
    weights: FusionWeights,
) -> Result<Vec<MergedCandidate>> {
    let mut signals: BTreeMap<&str, (f32, f32)> = BTreeMap::new();
    for result in bm25_results {
        signals.entry(&result.chunk_id).or_insert((0.0, 0.0)).0 =
            result.score;
    }
    for result in dense_results {
        signals.entry(&result.chunk_id).or_insert((0.0, 0.0)).1 =
            result.score;
    }

    let bm25_scores: Vec<f32> = signals.values().map(|s| s.0).collect();
    let dense_scores: Vec<f32> = signals.values().map(|s| s.1).collect();
    let fused = fuse(&bm25_scores, &dense_scores, method, weights)?;

    let mut merged: Vec<MergedCandidate> = signals
        .iter()
        .zip(&fused)
        .map(|((chunk_id, (s_bm25, s_dense)), fusion_score)| {
            MergedCandidate {
                chunk_id: chunk_id.to_string(),
                s_bm25: *s_bm25,
                s_dense: *s_dense,
                fusion_score: *fusion_score,
            }
        })
        .collect();

    merged.sort_by(|a, b| {
        b.fusion_score
            .partial_cmp(&a.fusion_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    merged.truncate(k);

    Ok(merged)
}
