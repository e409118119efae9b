//! Stage B: token-level rescoring of Scout candidates.
//!
//! Takes the first K_B candidates in Scout's order, rescores each with
//! the late-interaction provider, and persists the re-ranked list.

use std::{path::Path, time::Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::RetrievalConfig,
    corpus::ChunkStore,
    diagnostics::StageDiagnostics,
    error::Result,
    jsonl,
    late_interaction::{InteractionEvidence, InteractionScorer},
    provider::{self, NEUTRAL_SCORE},
    scout::Candidate,
};

/// File name of the Inspector output artifact.
pub const RESCORED_FILE: &str = "rescored.jsonl";

/// One rescored candidate, ranked by late-interaction score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescoredCandidate {
    pub chunk_id: String,
    pub s_li: f32,
    pub fusion_score: f32,
    pub s_bm25: f32,
    pub s_dense: f32,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub note_uid: String,
    /// Strongest token-level interactions; omitted entirely when none
    /// exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<InteractionEvidence>>,
}

/// Run the Inspector stage and persist `rescored.jsonl` plus diagnostics
/// into `out_dir`.
pub fn run_inspect(
    config: &RetrievalConfig,
    store: &ChunkStore,
    query: &str,
    scorer: &dyn InteractionScorer,
    candidates_path: &Path,
    out_dir: &Path,
) -> Result<StageDiagnostics> {
    let start = Instant::now();

    let (mut candidates, _malformed): (Vec<Candidate>, usize) =
        jsonl::read_stage_input(
            "inspector",
            "candidates file",
            candidates_path,
        )?;
    let input_count = candidates.len();

    // Plain truncation by Scout's order, not a re-merge.
    candidates.truncate(config.k_b);

    let rescore_start = Instant::now();
    let outcomes: Vec<Option<(RescoredCandidate, bool)>> = candidates
        .par_iter()
        .map(|candidate| {
            let Some(chunk) = store.get(&candidate.chunk_id) else {
                tracing::warn!(
                    chunk_id = %candidate.chunk_id,
                    "chunk missing from corpus, dropping candidate"
                );
                return None;
            };

            let ((s_li, evidence), fallback) = provider::score_with_retry(
                "late_interaction",
                &candidate.chunk_id,
                (NEUTRAL_SCORE, Vec::new()),
                || scorer.score_chunk(query, &chunk.text),
            );

            Some((
                RescoredCandidate {
                    chunk_id: candidate.chunk_id.clone(),
                    s_li,
                    fusion_score: candidate.fusion_score,
                    s_bm25: candidate.s_bm25,
                    s_dense: candidate.s_dense,
                    source_id: candidate.source_id.clone(),
                    note_uid: candidate.note_uid.clone(),
                    evidence: (!evidence.is_empty()).then_some(evidence),
                },
                fallback,
            ))
        })
        .collect();
    let rescore_secs = rescore_start.elapsed().as_secs_f64();

    let skipped = outcomes.iter().filter(|o| o.is_none()).count();
    let mut fallbacks = 0;
    let mut rescored: Vec<RescoredCandidate> = outcomes
        .into_iter()
        .flatten()
        .map(|(r, fallback)| {
            if fallback {
                fallbacks += 1;
            }
            r
        })
        .collect();

    rescored.sort_by(|a, b| {
        b.s_li
            .partial_cmp(&a.s_li)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    rescored.truncate(config.k_b);

    jsonl::write_records(&out_dir.join(RESCORED_FILE), &rescored)?;

    let mut diag = StageDiagnostics::new("inspector", config.k_b);
    diag.input_count = input_count;
    diag.output_count = rescored.len();
    diag.skipped = Some(skipped);
    diag.score_fallbacks = (fallbacks > 0).then_some(fallbacks);
    diag.record_timing("rescoring", rescore_secs);
    diag.record_timing("total", start.elapsed().as_secs_f64());
    diag.write(out_dir)?;

    Ok(diag)
}
