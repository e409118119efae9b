//! Newline-delimited JSON artifact I/O.
//!
//! Every artifact the cascade reads or writes is UTF-8 NDJSON, one record
//! per line. Writes go through a temporary file in the destination
//! directory followed by an atomic rename, so a crash mid-write never
//! leaves a truncated file visible under the final name.

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Read all records from an NDJSON file.
///
/// Blank lines are ignored. Lines that fail to parse are logged, counted,
/// and skipped; only an unreadable file is an error. Returns the parsed
/// records and the number of skipped lines.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut skipped = 0;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    "skipping malformed record: {e}"
                );
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

/// Read a stage's required input artifact, mapping an unreadable file to
/// the fatal-input error that aborts the run.
pub fn read_stage_input<T: DeserializeOwned>(
    stage: &'static str,
    what: &'static str,
    path: &Path,
) -> Result<(Vec<T>, usize)> {
    read_records(path).map_err(|e| match e {
        Error::Io(source) => Error::FatalInput {
            stage,
            what,
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Write records as NDJSON via write-to-temporary-then-rename.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    for record in records {
        let line = serde_json::to_string(record)?;
        tmp.write_all(line.as_bytes())?;
        tmp.write_all(b"\n")?;
    }
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}
