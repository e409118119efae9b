//! Stage A: broad candidate scouting.
//!
//! Queries the lexical and dense providers over the full corpus,
//! fuses the two signals, and persists the top-K_A candidates.

use std::{path::Path, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{
    config::RetrievalConfig,
    corpus::ChunkStore,
    diagnostics::StageDiagnostics,
    error::Result,
    fusion::{self, FusionMethod},
    jsonl,
    provider::ScoringProvider,
};

/// File name of the Scout output artifact.
pub const CANDIDATES_FILE: &str = "candidates.jsonl";

/// One Scout candidate, ranked by fused score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: String,
    pub s_bm25: f32,
    pub s_dense: f32,
    pub fusion_score: f32,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub note_uid: String,
}

/// Run the Scout stage and persist `candidates.jsonl` plus diagnostics
/// into `out_dir`.
pub fn run_scout(
    config: &RetrievalConfig,
    store: &ChunkStore,
    query: &str,
    lexical: &dyn ScoringProvider,
    dense: &dyn ScoringProvider,
    out_dir: &Path,
) -> Result<StageDiagnostics> {
    let start = Instant::now();
    let method = FusionMethod::parse(&config.fusion.method)?;

    // The two provider calls have no data dependency; the merge is keyed
    // by chunk_id, so completion order cannot affect the result.
    let (lexical_outcome, dense_outcome) = rayon::join(
        || {
            let t = Instant::now();
            lexical
                .score(query, store.chunks())
                .map(|scores| (scores, t.elapsed().as_secs_f64()))
        },
        || {
            let t = Instant::now();
            dense
                .score(query, store.chunks())
                .map(|scores| (scores, t.elapsed().as_secs_f64()))
        },
    );
    let (lexical_scores, lexical_secs) = lexical_outcome?;
    let (dense_scores, dense_secs) = dense_outcome?;

    let fusion_start = Instant::now();
    let merged = fusion::merge(
        &lexical_scores,
        &dense_scores,
        config.k_a,
        method,
        config.fusion.weights,
    )?;
    let candidates: Vec<Candidate> = merged
        .into_iter()
        .map(|m| {
            let (source_id, note_uid) = store
                .get(&m.chunk_id)
                .map(|c| (c.source_id.clone(), c.note_uid.clone()))
                .unwrap_or_default();
            Candidate {
                chunk_id: m.chunk_id,
                s_bm25: m.s_bm25,
                s_dense: m.s_dense,
                fusion_score: m.fusion_score,
                source_id,
                note_uid,
            }
        })
        .collect();
    let fusion_secs = fusion_start.elapsed().as_secs_f64();

    jsonl::write_records(&out_dir.join(CANDIDATES_FILE), &candidates)?;

    let mut diag = StageDiagnostics::new("scout", config.k_a);
    diag.input_count = store.len();
    diag.output_count = candidates.len();
    diag.lexical_results = Some(lexical_scores.len());
    diag.dense_results = Some(dense_scores.len());
    diag.record_timing("lexical_search", lexical_secs);
    diag.record_timing("dense_search", dense_secs);
    diag.record_timing("fusion", fusion_secs);
    diag.record_timing("total", start.elapsed().as_secs_f64());
    diag.write(out_dir)?;

    Ok(diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        corpus::test_support::store_from_pairs,
        dense::DenseProvider,
        lexical::LexicalProvider,
    };

    fn oncology_store() -> ChunkStore {
        store_from_pairs(&[
            (
                "c1",
                "Pancreatic adenocarcinoma with progression after \
                 FOLFIRINOX, transitioning to gemcitabine.",
            ),
            (
                "c2",
                "Stable disease on surveillance imaging, no new lesions.",
            ),
            (
                "c3",
                "Discussed FOLFIRINOX toxicity, grade 2 neuropathy.",
            ),
        ])
    }

    fn run(
        config: &RetrievalConfig,
        store: &ChunkStore,
        query: &str,
        out_dir: &Path,
    ) -> StageDiagnostics {
        let limit = config.scout_provider_limit();
        let lexical = LexicalProvider::new(&config.bm25, limit);
        let dense = DenseProvider::new(&config.dense, limit);
        run_scout(config, store, query, &lexical, &dense, out_dir).unwrap()
    }

    #[test]
    fn candidates_are_bounded_and_descending() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RetrievalConfig::default();
        let store = oncology_store();

        let diag =
            run(&config, &store, "progression after FOLFIRINOX", tmp.path());

        let (candidates, _): (Vec<Candidate>, usize) =
            jsonl::read_records(&tmp.path().join(CANDIDATES_FILE)).unwrap();

        assert!(!candidates.is_empty());
        assert!(candidates.len() <= config.k_a);
        assert!(candidates.len() <= store.len());
        assert_eq!(diag.output_count, candidates.len());
        for window in candidates.windows(2) {
            assert!(window[0].fusion_score >= window[1].fusion_score);
        }
    }

    #[test]
    fn k_a_truncates_the_merge() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RetrievalConfig {
            k_a: 1,
            ..RetrievalConfig::default()
        };
        let store = oncology_store();

        run(&config, &store, "FOLFIRINOX", tmp.path());

        let (candidates, _): (Vec<Candidate>, usize) =
            jsonl::read_records(&tmp.path().join(CANDIDATES_FILE)).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn candidates_carry_source_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RetrievalConfig::default();
        let store = oncology_store();

        run(&config, &store, "FOLFIRINOX", tmp.path());

        let (candidates, _): (Vec<Candidate>, usize) =
            jsonl::read_records(&tmp.path().join(CANDIDATES_FILE)).unwrap();
        for c in &candidates {
            assert!(!c.source_id.is_empty());
            assert!(!c.note_uid.is_empty());
        }
    }

    #[test]
    fn no_provider_hits_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RetrievalConfig::default();
        let store = oncology_store();

        // Punctuation-only query: neither provider can produce a hit.
        let diag = run(&config, &store, "???", tmp.path());

        assert_eq!(diag.output_count, 0);
        let (candidates, _): (Vec<Candidate>, usize) =
            jsonl::read_records(&tmp.path().join(CANDIDATES_FILE)).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn diagnostics_record_phase_counts_and_timings() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RetrievalConfig::default();
        let store = oncology_store();

        let diag = run(&config, &store, "FOLFIRINOX", tmp.path());

        assert_eq!(diag.stage, "scout");
        assert_eq!(diag.input_count, store.len());
        assert!(diag.lexical_results.is_some());
        assert!(diag.dense_results.is_some());
        for phase in ["lexical_search", "dense_search", "fusion", "total"] {
            assert!(diag.timing.contains_key(phase), "missing {phase}");
        }
        assert!(
            tmp.path()
                .join(crate::diagnostics::DIAGNOSTICS_FILE)
                .exists()
        );
    }

    #[test]
    fn reruns_are_byte_identical() {
        let config = RetrievalConfig::default();
        let store = oncology_store();
        let query = "progression after FOLFIRINOX";

        let tmp_a = tempfile::tempdir().unwrap();
        let tmp_b = tempfile::tempdir().unwrap();
        run(&config, &store, query, tmp_a.path());
        run(&config, &store, query, tmp_b.path());

        let a =
            std::fs::read(tmp_a.path().join(CANDIDATES_FILE)).unwrap();
        let b =
            std::fs::read(tmp_b.path().join(CANDIDATES_FILE)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unsupported_fusion_method_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = RetrievalConfig::default();
        config.fusion.method = "rank_product".to_string();
        let store = oncology_store();

        let limit = config.scout_provider_limit();
        let lexical = LexicalProvider::new(&config.bm25, limit);
        let dense = DenseProvider::new(&config.dense, limit);
        let err = run_scout(
            &config,
            &store,
            "FOLFIRINOX",
            &lexical,
            &dense,
            tmp.path(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::UnsupportedMethod(_)
        ));
    }
}
