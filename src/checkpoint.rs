use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{InputError, PersistenceError};
use crate::record::ScrapeRecord;

/// In-memory accumulator of every record produced so far, flushed to disk
/// as one complete JSON array.
///
/// Keys are work-item indices, so the snapshot order never depends on the
/// order in which concurrent fetches finished.
pub struct Checkpoint {
    path: PathBuf,
    every: usize,
    records: BTreeMap<usize, ScrapeRecord>,
    since_flush: usize,
    flushes: usize,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>, every: usize) -> Self {
        Checkpoint {
            path: path.into(),
            every: every.max(1),
            records: BTreeMap::new(),
            since_flush: 0,
            flushes: 0,
        }
    }

    /// Place a record from a previous run. Does not count towards the flush interval.
    pub fn seed(&mut self, index: usize, record: ScrapeRecord) {
        self.records.insert(index, record);
    }

    /// Add a freshly processed record; flushes when the interval is reached.
    /// Returns whether a flush happened. A recorded success is never
    /// replaced; a recorded failure gives way to the newer result.
    pub fn record(&mut self, index: usize, record: ScrapeRecord) -> Result<bool, PersistenceError> {
        if self.records.get(&index).is_some_and(|existing| !existing.is_failure()) {
            warn!("Item {} already recorded, keeping the first result", index);
            return Ok(false);
        }
        self.records.insert(index, record);
        self.since_flush += 1;
        if self.since_flush >= self.every {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Overwrite the artifact with the whole accumulator.
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        let snapshot: Vec<&ScrapeRecord> = self.records.values().collect();
        write_json(&self.path, &snapshot)?;
        self.since_flush = 0;
        self.flushes += 1;
        debug!(
            "Checkpoint {}: {} records -> {}",
            self.flushes,
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Final unconditional flush. Hands back the records in index order.
    pub fn finish(mut self) -> Result<Vec<ScrapeRecord>, PersistenceError> {
        self.flush()?;
        info!(
            "Saved {} records to {} ({} flushes)",
            self.records.len(),
            self.path.display(),
            self.flushes
        );
        Ok(self.records.into_values().collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Pretty-printed JSON, written to a sibling temp file and renamed over the
/// target so readers only ever see a complete document.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let body = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_path(path);
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, body).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Read a results array written by a previous run.
pub fn load_records(path: &Path) -> Result<Vec<ScrapeRecord>, InputError> {
    let raw = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

// ── Tests ──
