use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "notesieve",
    about = "A cascading retrieval CLI for clinical-note passages"
)]
pub struct Cli {
    /// Path to the retrieval configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stage A: fuse lexical and dense signals into candidates
    Scout(ScoutArgs),
    /// Stage B: late-interaction rescoring of Scout candidates
    Inspect(InspectArgs),
    /// Stage C: cross-encoder scoring, calibration, identity attachment
    Judge(JudgeArgs),
    /// Run all three stages in sequence
    Pipeline(PipelineArgs),
}

// -- Scout --

#[derive(Debug, Parser)]
pub struct ScoutArgs {
    /// Chunk corpus: a chunks.jsonl file or a directory containing them
    pub chunks: PathBuf,

    /// The search query
    pub query: String,

    /// Output directory for candidates.jsonl and diagnostics.jsonl
    pub out_dir: PathBuf,
}

// -- Inspect --

#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Path to candidates.jsonl from the Scout stage
    pub candidates: PathBuf,

    /// Chunk corpus: a chunks.jsonl file or a directory containing them
    pub chunks: PathBuf,

    /// The search query
    pub query: String,

    /// Output directory for rescored.jsonl and diagnostics.jsonl
    pub out_dir: PathBuf,
}

// -- Judge --

#[derive(Debug, Parser)]
pub struct JudgeArgs {
    /// Path to rescored.jsonl from the Inspector stage
    pub rescored: PathBuf,

    /// Chunk corpus: a chunks.jsonl file or a directory containing them
    pub chunks: PathBuf,

    /// The search query
    pub query: String,

    /// Output directory for final.jsonl and diagnostics.jsonl
    pub out_dir: PathBuf,

    /// Identity link table (chunk_id -> patient_uid), NDJSON
    #[arg(long)]
    pub links: Option<PathBuf>,
}

// -- Pipeline --

#[derive(Debug, Parser)]
pub struct PipelineArgs {
    /// Chunk corpus: a chunks.jsonl file or a directory containing them
    pub chunks: PathBuf,

    /// The search query
    pub query: String,

    /// Output directory; each stage writes to its own subdirectory
    pub out_dir: PathBuf,

    /// Identity link table (chunk_id -> patient_uid), NDJSON
    #[arg(long)]
    pub links: Option<PathBuf>,
}
