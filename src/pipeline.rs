//! Chained execution of all three stages through their on-disk
//! artifacts.
//!
//! Each stage still reads its predecessor's artifact from disk, so a
//! pipeline run exercises exactly the same file contracts as three
//! separate invocations, and any stage can be re-run individually
//! afterwards.

use std::path::Path;

use crate::{
    config::RetrievalConfig,
    corpus::ChunkStore,
    cross_encoder::PairScorer,
    diagnostics::StageDiagnostics,
    error::Result,
    inspector::{self, RESCORED_FILE},
    judge,
    late_interaction::InteractionScorer,
    links::LinkTable,
    provider::ScoringProvider,
    scout::{self, CANDIDATES_FILE},
};

/// Run Scout, Inspector and Judge in sequence under `out_dir`, each in
/// its own subdirectory. Returns the three diagnostics records in stage
/// order.
#[allow(clippy::too_many_arguments)]
pub fn run_pipeline(
    config: &RetrievalConfig,
    store: &ChunkStore,
    query: &str,
    lexical: &dyn ScoringProvider,
    dense: &dyn ScoringProvider,
    interaction: &dyn InteractionScorer,
    pair: &dyn PairScorer,
    links: &LinkTable,
    out_dir: &Path,
) -> Result<Vec<StageDiagnostics>> {
    let scout_dir = out_dir.join("scout");
    let inspector_dir = out_dir.join("inspector");
    let judge_dir = out_dir.join("judge");

    let scout_diag =
        scout::run_scout(config, store, query, lexical, dense, &scout_dir)?;
    let inspect_diag = inspector::run_inspect(
        config,
        store,
        query,
        interaction,
        &scout_dir.join(CANDIDATES_FILE),
        &inspector_dir,
    )?;
    let judge_diag = judge::run_judge(
        config,
        store,
        query,
        pair,
        &inspector_dir.join(RESCORED_FILE),
        links,
        &judge_dir,
    )?;

    Ok(vec![scout_diag, inspect_diag, judge_diag])
}
