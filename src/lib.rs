//! notesieve - a cascading retrieval engine for clinical-note passages.
//!
//! notesieve narrows a chunk corpus to a ranked result set through three
//! successively costlier stages: a Scout fusing BM25 and dense signals,
//! an Inspector doing token-level late-interaction rescoring, and a
//! Judge doing cross-encoder scoring with batch calibration and
//! patient-identity attachment. Every stage reads and writes NDJSON
//! artifacts, is deterministic given deterministic providers, and can be
//! re-run in isolation.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use notesieve::{
//!     config::RetrievalConfig,
//!     corpus::ChunkStore,
//!     dense::DenseProvider,
//!     lexical::LexicalProvider,
//!     scout,
//! };
//!
//! let config = RetrievalConfig::default();
//! let store = ChunkStore::load(Path::new("chunks.jsonl")).unwrap();
//! let limit = config.scout_provider_limit();
//! let lexical = LexicalProvider::new(&config.bm25, limit);
//! let dense = DenseProvider::new(&config.dense, limit);
//!
//! let diag = scout::run_scout(
//!     &config,
//!     &store,
//!     "progression after FOLFIRINOX",
//!     &lexical,
//!     &dense,
//!     Path::new("out/scout"),
//! )
//! .unwrap();
//! println!("{} candidate(s)", diag.output_count);
//! ```

pub mod config;
pub mod corpus;
pub mod cross_encoder;
pub mod dense;
pub mod diagnostics;
pub mod error;
pub mod fusion;
pub mod inspector;
pub mod jsonl;
pub mod judge;
pub mod late_interaction;
pub mod lexical;
pub mod links;
pub mod pipeline;
pub mod provider;
pub mod scout;
pub mod text_util;

pub use config::RetrievalConfig;
pub use corpus::{Chunk, ChunkStore};
pub use diagnostics::StageDiagnostics;
pub use error::{Error, Result};
pub use links::LinkTable;
pub use provider::{ProviderScore, ScoringProvider};
