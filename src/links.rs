//! The identity link table.
//!
//! An external identity-resolution process emits NDJSON records mapping
//! chunk identifiers to resolved patient identifiers. The Judge consumes
//! the table read-only; a missing table simply means no attachments, so
//! the loader is tolerant by contract.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LinkRecord {
    chunk_id: Option<String>,
    patient_uid: Option<String>,
}

/// chunk_id → patient_uid lookup.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: HashMap<String, String>,
}

impl LinkTable {
    /// An empty table (no link file supplied).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the table from an NDJSON file.
    ///
    /// An unreadable file or malformed record yields a warning, never an
    /// error; records missing either identifier are ignored.
    pub fn load(path: &Path) -> Self {
        let (records, _skipped): (Vec<LinkRecord>, usize) =
            match crate::jsonl::read_records(path) {
                Ok(read) => read,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        "identity link table unavailable: {e}"
                    );
                    return Self::empty();
                }
            };

        let mut links = HashMap::new();
        for record in records {
            if let (Some(chunk_id), Some(patient_uid)) =
                (record.chunk_id, record.patient_uid)
            {
                links.insert(chunk_id, patient_uid);
            }
        }

        Self { links }
    }

    pub fn patient_uid(&self, chunk_id: &str) -> Option<&str> {
        self.links.get(chunk_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
