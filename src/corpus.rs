//! The canonical chunk corpus.
//!
//! Chunks are produced by an external ingestion/normalization pipeline and
//! consumed read-only by every stage of the cascade. The corpus lives
//! either in a single NDJSON file or in a directory tree containing
//! `chunks.jsonl` files.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name searched for when the corpus path is a directory.
pub const CHUNKS_FILE: &str = "chunks.jsonl";

/// A bounded, identifiable span of note text, the unit of retrieval.
///
/// Immutable once ingested; the cascade never mutates chunk records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub note_uid: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub source_file: String,
}

/// Read-only lookup from chunk identifier to chunk record.
///
/// Chunks keep their on-disk order, so two loads of the same corpus see
/// the same sequence; a duplicated chunk_id keeps the last record seen.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
    skipped: usize,
}

impl ChunkStore {
    /// Load the corpus from a `chunks.jsonl` file, or from a directory
    /// searched recursively for `chunks.jsonl` files.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self::default();

        if path.is_dir() {
            let mut files = Vec::new();
            collect_chunk_files(path, &mut files)?;
            files.sort();
            for file in &files {
                store.load_file(file)?;
            }
        } else {
            store.load_file(path)?;
        }

        Ok(store)
    }

    /// Load the corpus for a stage, mapping an unreadable path to the
    /// fatal-input error that aborts the run.
    pub fn load_for_stage(stage: &'static str, path: &Path) -> Result<Self> {
        Self::load(path).map_err(|e| match e {
            Error::Io(source) => Error::FatalInput {
                stage,
                what: "chunk corpus",
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let (chunks, skipped): (Vec<Chunk>, usize) =
            crate::jsonl::read_records(path)?;
        self.skipped += skipped;

        for chunk in chunks {
            match self.by_id.get(&chunk.chunk_id) {
                Some(&idx) => self.chunks[idx] = chunk,
                None => {
                    self.by_id
                        .insert(chunk.chunk_id.clone(), self.chunks.len());
                    self.chunks.push(chunk);
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.by_id.get(chunk_id).map(|&idx| &self.chunks[idx])
    }

    /// All chunks in load order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of malformed corpus lines dropped during loading.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn collect_chunk_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            collect_chunk_files(&entry.path(), files)?;
        } else if file_type.is_file()
            && entry.file_name().to_string_lossy() == CHUNKS_FILE
        {
            files.push(entry.path());
        }
    }
    Ok(())
}
