//! Stage C: cross-encoder scoring, calibration, identity attachment.
//!
//! Truncates the Inspector's list to K_C, scores the surviving batch
//! with the cross-encoder, calibrates the raw scores jointly, and
//! re-ranks by calibrated score. The order is fixed: truncate, then
//! calibrate, then sort — calibrating before truncation would change
//! the calibration distribution and with it the final ranking.

use std::{path::Path, time::Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::RetrievalConfig,
    corpus::ChunkStore,
    cross_encoder::PairScorer,
    diagnostics::StageDiagnostics,
    error::Result,
    fusion,
    inspector::RescoredCandidate,
    jsonl,
    links::LinkTable,
    provider::{self, NEUTRAL_SCORE},
};

/// File name of the Judge output artifact.
pub const FINAL_FILE: &str = "final.jsonl";

/// Positional pointer back into the source note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pointers {
    pub chunk_offset: u64,
    pub file: String,
}

/// One final ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub chunk_id: String,
    pub calibrated_score: f32,
    pub raw_xenc_score: f32,
    pub s_li: f32,
    pub fusion_score: f32,
    #[serde(default)]
    pub source_id: String,
    pub pointers: Pointers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_uid: Option<String>,
}

/// Run the Judge stage and persist `final.jsonl` plus diagnostics into
/// `out_dir`.
pub fn run_judge(
    config: &RetrievalConfig,
    store: &ChunkStore,
    query: &str,
    scorer: &dyn PairScorer,
    rescored_path: &Path,
    links: &LinkTable,
    out_dir: &Path,
) -> Result<StageDiagnostics> {
    let start = Instant::now();

    let (mut rescored, _malformed): (Vec<RescoredCandidate>, usize) =
        jsonl::read_stage_input("judge", "rescored file", rescored_path)?;
    let input_count = rescored.len();

    // Truncate to K_C before scoring; the calibration batch is exactly
    // the survivors.
    rescored.truncate(config.k_c);

    let scoring_start = Instant::now();
    let outcomes: Vec<Option<(FinalResult, bool)>> = rescored
        .par_iter()
        .map(|candidate| {
            let Some(chunk) = store.get(&candidate.chunk_id) else {
                tracing::warn!(
                    chunk_id = %candidate.chunk_id,
                    "chunk missing from corpus, dropping candidate"
                );
                return None;
            };

            let (raw_score, fallback) = provider::score_with_retry(
                "cross_encoder",
                &candidate.chunk_id,
                NEUTRAL_SCORE,
                || scorer.score_pair(query, &chunk.text),
            );

            Some((
                FinalResult {
                    chunk_id: candidate.chunk_id.clone(),
                    // Placeholder until the whole batch is calibrated.
                    calibrated_score: raw_score,
                    raw_xenc_score: raw_score,
                    s_li: candidate.s_li,
                    fusion_score: candidate.fusion_score,
                    source_id: candidate.source_id.clone(),
                    pointers: Pointers {
                        chunk_offset: chunk.offset,
                        file: chunk.source_file.clone(),
                    },
                    patient_uid: links
                        .patient_uid(&candidate.chunk_id)
                        .map(str::to_string),
                },
                fallback,
            ))
        })
        .collect();
    let scoring_secs = scoring_start.elapsed().as_secs_f64();

    let skipped = outcomes.iter().filter(|o| o.is_none()).count();
    let mut fallbacks = 0;
    let mut results: Vec<FinalResult> = outcomes
        .into_iter()
        .flatten()
        .map(|(r, fallback)| {
            if fallback {
                fallbacks += 1;
            }
            r
        })
        .collect();

    let raw_scores: Vec<f32> =
        results.iter().map(|r| r.raw_xenc_score).collect();
    let calibrated = fusion::normalize(&raw_scores);
    for (result, score) in results.iter_mut().zip(&calibrated) {
        result.calibrated_score = *score;
    }

    results.sort_by(|a, b| {
        b.calibrated_score
            .partial_cmp(&a.calibrated_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(config.k_c);

    jsonl::write_records(&out_dir.join(FINAL_FILE), &results)?;

    let attached =
        results.iter().filter(|r| r.patient_uid.is_some()).count();

    let mut diag = StageDiagnostics::new("judge", config.k_c);
    diag.input_count = input_count;
    diag.output_count = results.len();
    diag.skipped = Some(skipped);
    diag.score_fallbacks = (fallbacks > 0).then_some(fallbacks);
    diag.patient_uid_attached = Some(attached);
    diag.record_timing("cross_encoding", scoring_secs);
    diag.record_timing("total", start.elapsed().as_secs_f64());
    diag.write(out_dir)?;

    Ok(diag)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        corpus::test_support::store_from_pairs,
        cross_encoder::CrossEncoderProvider,
        error::Error,
        inspector::RESCORED_FILE,
    };

    /// Scores each chunk text from a fixed table.
    struct TableScorer(HashMap<String, f32>);

    impl TableScorer {
        fn new(entries: &[(&str, f32)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(text, score)| (text.to_string(), *score))
                    .collect(),
            )
        }
    }

    impl PairScorer for TableScorer {
        fn score_pair(&self, _query: &str, text: &str) -> Result<f32> {
            Ok(self.0.get(text).copied().unwrap_or(0.0))
        }
    }

    struct FailingScorer;

    impl PairScorer for FailingScorer {
        fn score_pair(&self, _query: &str, _text: &str) -> Result<f32> {
            Err(Error::Provider {
                provider: "cross_encoder",
                message: "backend unavailable".into(),
            })
        }
    }

    fn rescored(chunk_id: &str, s_li: f32) -> RescoredCandidate {
        RescoredCandidate {
            chunk_id: chunk_id.to_string(),
            s_li,
            fusion_score: s_li,
            s_bm25: 0.0,
            s_dense: 0.0,
            source_id: "Source-A".to_string(),
            note_uid: format!("note-{chunk_id}"),
            evidence: None,
        }
    }

    fn write_rescored(
        dir: &Path,
        candidates: &[RescoredCandidate],
    ) -> std::path::PathBuf {
        let path = dir.join(RESCORED_FILE);
        jsonl::write_records(&path, candidates).unwrap();
        path
    }

    #[test]
    fn single_candidate_calibrates_to_midpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[("only", "some chunk text")]);
        let path = write_rescored(tmp.path(), &[rescored("only", 0.9)]);

        let scorer = TableScorer::new(&[("some chunk text", 0.87)]);
        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        run_judge(
            &config,
            &store,
            "query",
            &scorer,
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        let (results, _): (Vec<FinalResult>, usize) =
            jsonl::read_records(&out.join(FINAL_FILE)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].raw_xenc_score, 0.87);
        assert_eq!(results[0].calibrated_score, 0.5);
    }

    #[test]
    fn truncates_before_calibrating() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[
            ("c1", "text one"),
            ("c2", "text two"),
            ("c3", "text three"),
        ]);
        let path = write_rescored(
            tmp.path(),
            &[rescored("c1", 0.9), rescored("c2", 0.8), rescored("c3", 0.7)],
        );

        let scorer = TableScorer::new(&[
            ("text one", 0.9),
            ("text two", 0.6),
            ("text three", 0.1),
        ]);
        let config = RetrievalConfig {
            k_c: 2,
            ..RetrievalConfig::default()
        };
        let out = tmp.path().join("out");
        run_judge(
            &config,
            &store,
            "query",
            &scorer,
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        let (results, _): (Vec<FinalResult>, usize) =
            jsonl::read_records(&out.join(FINAL_FILE)).unwrap();
        assert_eq!(results.len(), 2);
        // Min-max runs over the surviving pair {0.9, 0.6} only; had the
        // full batch been calibrated first, c2 would land mid-range
        // instead of at 0.0.
        assert_eq!(results[0].chunk_id, "c1");
        assert_eq!(results[0].calibrated_score, 1.0);
        assert_eq!(results[1].chunk_id, "c2");
        assert_eq!(results[1].calibrated_score, 0.0);
    }

    #[test]
    fn reranks_by_calibrated_score() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[
            ("by_li", "weak cross encoder match"),
            ("by_xenc", "strong cross encoder match"),
        ]);
        // Inspector preferred "by_li"; the cross-encoder disagrees.
        let path = write_rescored(
            tmp.path(),
            &[rescored("by_li", 0.9), rescored("by_xenc", 0.2)],
        );

        let scorer = TableScorer::new(&[
            ("weak cross encoder match", 0.2),
            ("strong cross encoder match", 0.95),
        ]);
        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        run_judge(
            &config,
            &store,
            "query",
            &scorer,
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        let (results, _): (Vec<FinalResult>, usize) =
            jsonl::read_records(&out.join(FINAL_FILE)).unwrap();
        assert_eq!(results[0].chunk_id, "by_xenc");
        assert!(
            results[0].calibrated_score > results[1].calibrated_score
        );
    }

    #[test]
    fn attaches_patient_uid_and_counts_attachments() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[
            ("linked", "alpha text"),
            ("unlinked", "beta text"),
        ]);
        let path = write_rescored(
            tmp.path(),
            &[rescored("linked", 0.9), rescored("unlinked", 0.8)],
        );

        let links_path = tmp.path().join("note_links.jsonl");
        std::fs::write(
            &links_path,
            "{\"chunk_id\":\"linked\",\"patient_uid\":\"P-042\"}\n",
        )
        .unwrap();
        let links = LinkTable::load(&links_path);

        let scorer =
            TableScorer::new(&[("alpha text", 0.9), ("beta text", 0.3)]);
        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        let diag = run_judge(
            &config,
            &store,
            "query",
            &scorer,
            &path,
            &links,
            &out,
        )
        .unwrap();

        assert_eq!(diag.patient_uid_attached, Some(1));

        let (results, _): (Vec<FinalResult>, usize) =
            jsonl::read_records(&out.join(FINAL_FILE)).unwrap();
        let linked =
            results.iter().find(|r| r.chunk_id == "linked").unwrap();
        assert_eq!(linked.patient_uid.as_deref(), Some("P-042"));

        // Absent link ⇒ field omitted from the artifact entirely.
        let raw = std::fs::read_to_string(out.join(FINAL_FILE)).unwrap();
        let unlinked_line =
            raw.lines().find(|l| l.contains("unlinked")).unwrap();
        assert!(!unlinked_line.contains("patient_uid"));
    }

    #[test]
    fn pointers_come_from_the_chunk_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[("c0", "pointer text")]);
        let path = write_rescored(tmp.path(), &[rescored("c0", 0.5)]);

        let scorer = TableScorer::new(&[("pointer text", 0.5)]);
        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        run_judge(
            &config,
            &store,
            "query",
            &scorer,
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        let (results, _): (Vec<FinalResult>, usize) =
            jsonl::read_records(&out.join(FINAL_FILE)).unwrap();
        let chunk = store.get("c0").unwrap();
        assert_eq!(results[0].pointers.chunk_offset, chunk.offset);
        assert_eq!(results[0].pointers.file, chunk.source_file);
    }

    #[test]
    fn missing_chunk_is_dropped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[("real", "real text")]);
        let path = write_rescored(
            tmp.path(),
            &[rescored("ghost", 0.9), rescored("real", 0.8)],
        );

        let scorer = TableScorer::new(&[("real text", 0.4)]);
        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        let diag = run_judge(
            &config,
            &store,
            "query",
            &scorer,
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        assert_eq!(diag.skipped, Some(1));
        assert_eq!(diag.output_count, 1);
    }

    #[test]
    fn failing_scorer_falls_back_to_neutral() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[("c1", "one"), ("c2", "two")]);
        let path = write_rescored(
            tmp.path(),
            &[rescored("c1", 0.9), rescored("c2", 0.8)],
        );

        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        let diag = run_judge(
            &config,
            &store,
            "query",
            &FailingScorer,
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        assert_eq!(diag.score_fallbacks, Some(2));
        let (results, _): (Vec<FinalResult>, usize) =
            jsonl::read_records(&out.join(FINAL_FILE)).unwrap();
        // Every raw score is the neutral fallback, so calibration hits
        // the degenerate case.
        for r in &results {
            assert_eq!(r.calibrated_score, 0.5);
        }
    }

    #[test]
    fn missing_rescored_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[("c1", "text")]);
        let config = RetrievalConfig::default();

        let err = run_judge(
            &config,
            &store,
            "query",
            &CrossEncoderProvider::new(&config.xenc),
            &tmp.path().join("absent.jsonl"),
            &LinkTable::empty(),
            tmp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("judge"));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_from_pairs(&[("c1", "text")]);
        let path = write_rescored(tmp.path(), &[]);

        let config = RetrievalConfig::default();
        let out = tmp.path().join("out");
        let diag = run_judge(
            &config,
            &store,
            "query",
            &CrossEncoderProvider::new(&config.xenc),
            &path,
            &LinkTable::empty(),
            &out,
        )
        .unwrap();

        assert_eq!(diag.output_count, 0);
        assert_eq!(diag.patient_uid_attached, Some(0));
    }
}
