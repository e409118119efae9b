//! Per-stage diagnostics records.
//!
//! Diagnostics are a write-once side artifact: the durable status record
//! of a stage run. Downstream stages never read them back.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the diagnostics artifact within a stage's output
/// directory.
pub const DIAGNOSTICS_FILE: &str = "diagnostics.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    pub stage: String,
    pub input_count: usize,
    pub output_count: usize,
    #[serde(rename = "K")]
    pub k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense_results: Option<usize>,
    /// Candidates dropped because their chunk_id was absent from the
    /// corpus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    /// Candidates scored with the neutral fallback after retry
    /// exhaustion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_fallbacks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_uid_attached: Option<usize>,
    /// Per-phase timings in seconds; always contains `total`.
    pub timing: BTreeMap<String, f64>,
}

impl StageDiagnostics {
    pub fn new(stage: &str, k: usize) -> Self {
        Self {
            stage: stage.to_string(),
            input_count: 0,
            output_count: 0,
            k,
            lexical_results: None,
            dense_results: None,
            skipped: None,
            score_fallbacks: None,
            patient_uid_attached: None,
            timing: BTreeMap::new(),
        }
    }

    pub fn record_timing(&mut self, phase: &str, seconds: f64) {
        self.timing.insert(phase.to_string(), seconds);
    }

    pub fn total_seconds(&self) -> f64 {
        self.timing.get("total").copied().unwrap_or(0.0)
    }

    /// Persist the record as a one-line NDJSON artifact in `out_dir`.
    pub fn write(&self, out_dir: &Path) -> Result<()> {
        crate::jsonl::write_records(
            &out_dir.join(DIAGNOSTICS_FILE),
            std::slice::from_ref(self),
        )
    }
}
