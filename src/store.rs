//! Snapshot store seam.
//!
//! [`SnapshotStore`] is the read-only view of recorded enumerations the tracker
//! works against. Two implementations ship with the crate: [`MemoryStore`] for
//! tests and programmatic use, and [`DirStore`], which reads a directory of
//! JSON-lines enumeration files (one file per enumeration, the file stem being
//! its id).
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, list_enumeration_files, read_records};
use crate::output::{EnumerationId, OutputRecord, TimeRange};
use crate::record::StoredRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store directory not found: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("unknown enumeration: {0}")]
    UnknownEnumeration(String),
    #[error("enumeration {0} has no records")]
    EmptyEnumeration(String),
    #[error("failed to read store: {0:#}")]
    Read(anyhow::Error),
}

/// Read-only provider of recorded enumerations.
pub trait SnapshotStore {
    /// Every enumeration id known to the store, in store order.
    fn list_enumerations(&self) -> Result<Vec<EnumerationId>, StoreError>;

    /// Root domains the enumeration was run against.
    fn domains_of(&self, id: &str) -> Result<Vec<String>, StoreError>;

    /// Earliest and latest activity recorded for the enumeration.
    fn date_range_of(&self, id: &str) -> Result<TimeRange, StoreError>;

    /// Output records of the enumeration. With `use_cache` false, records the
    /// run only replayed from earlier data are left out.
    fn output_of(&self, id: &str, use_cache: bool) -> Result<Vec<OutputRecord>, StoreError>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for &S {
    fn list_enumerations(&self) -> Result<Vec<EnumerationId>, StoreError> {
        (**self).list_enumerations()
    }
    fn domains_of(&self, id: &str) -> Result<Vec<String>, StoreError> {
        (**self).domains_of(id)
    }
    fn date_range_of(&self, id: &str) -> Result<TimeRange, StoreError> {
        (**self).date_range_of(id)
    }
    fn output_of(&self, id: &str, use_cache: bool) -> Result<Vec<OutputRecord>, StoreError> {
        (**self).output_of(id, use_cache)
    }
}

#[derive(Debug, Clone)]
struct MemoryEnumeration {
    id: EnumerationId,
    domains: Vec<String>,
    range: TimeRange,
    output: Vec<(OutputRecord, bool)>,
}

/// Enumerations held in memory, listed in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    enums: Vec<MemoryEnumeration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { enums: Vec::new() }
    }

    /// Add an enumeration whose records were all observed live. Re-inserting
    /// an existing id replaces it.
    pub fn insert(
        &mut self,
        id: &str,
        domains: &[&str],
        range: TimeRange,
        output: Vec<OutputRecord>,
    ) -> &mut Self {
        let entry = MemoryEnumeration {
            id: id.to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            range,
            output: output.into_iter().map(|o| (o, false)).collect(),
        };
        match self.enums.iter_mut().find(|e| e.id == id) {
            Some(existing) => *existing = entry,
            None => self.enums.push(entry),
        }
        self
    }

    /// Append a record the enumeration replayed from earlier data.
    pub fn push_cached(&mut self, id: &str, record: OutputRecord) -> Result<(), StoreError> {
        let e = self.find_mut(id)?;
        e.output.push((record, true));
        Ok(())
    }

    fn find(&self, id: &str) -> Result<&MemoryEnumeration, StoreError> {
        self.enums
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::UnknownEnumeration(id.to_string()))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut MemoryEnumeration, StoreError> {
        self.enums
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::UnknownEnumeration(id.to_string()))
    }
}

impl SnapshotStore for MemoryStore {
    fn list_enumerations(&self) -> Result<Vec<EnumerationId>, StoreError> {
        Ok(self.enums.iter().map(|e| e.id.clone()).collect())
    }

    fn domains_of(&self, id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.find(id)?.domains.clone())
    }

    fn date_range_of(&self, id: &str) -> Result<TimeRange, StoreError> {
        Ok(self.find(id)?.range)
    }

    fn output_of(&self, id: &str, use_cache: bool) -> Result<Vec<OutputRecord>, StoreError> {
        Ok(filter_cached(
            self.find(id)?.output.iter().map(|(o, c)| (o, *c)),
            use_cache,
        ))
    }
}

fn filter_cached<'a>(
    records: impl Iterator<Item = (&'a OutputRecord, bool)>,
    use_cache: bool,
) -> Vec<OutputRecord> {
    records
        .filter(|(_, cached)| use_cache || !cached)
        .map(|(o, _)| o.clone())
        .collect()
}

/// Directory of `<id>.json` enumeration files, one JSON record per line.
#[derive(Debug)]
pub struct DirStore {
    files: HashMap<EnumerationId, PathBuf>,
    order: Vec<EnumerationId>,
    mmap_threshold_bytes: u64,
}

impl DirStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        Self::open_with_threshold(root, DEFAULT_MMAP_THRESHOLD_BYTES)
    }

    /// Open a store directory; files at or above `mmap_threshold_bytes` are
    /// memory-mapped when read.
    pub fn open_with_threshold<P: AsRef<Path>>(
        root: P,
        mmap_threshold_bytes: u64,
    ) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StoreError::NotADirectory(root));
        }
        let listed = list_enumeration_files(&root).map_err(StoreError::Read)?;
        debug!("{}: {} enumeration files", root.display(), listed.len());
        let order = listed.iter().map(|(id, _)| id.clone()).collect();
        Ok(Self {
            files: listed.into_iter().collect(),
            order,
            mmap_threshold_bytes,
        })
    }

    fn load(&self, id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let path = self
            .files
            .get(id)
            .ok_or_else(|| StoreError::UnknownEnumeration(id.to_string()))?;
        let loaded = read_records(path, self.mmap_threshold_bytes).map_err(StoreError::Read)?;
        if loaded.malformed > 0 {
            debug!("{}: {} malformed lines skipped", id, loaded.malformed);
        }
        Ok(loaded.records)
    }
}

impl SnapshotStore for DirStore {
    fn list_enumerations(&self) -> Result<Vec<EnumerationId>, StoreError> {
        Ok(self.order.clone())
    }

    fn domains_of(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let mut domains: Vec<String> = Vec::new();
        for rec in self.load(id)? {
            if !rec.domain.is_empty() && !domains.contains(&rec.domain) {
                domains.push(rec.domain);
            }
        }
        Ok(domains)
    }

    fn date_range_of(&self, id: &str) -> Result<TimeRange, StoreError> {
        let records = self.load(id)?;
        let earliest = records.iter().map(|r| r.timestamp).min();
        let latest = records.iter().map(|r| r.timestamp).max();
        match (earliest, latest) {
            (Some(e), Some(l)) => Ok(TimeRange::new(e, l)),
            _ => Err(StoreError::EmptyEnumeration(id.to_string())),
        }
    }

    fn output_of(&self, id: &str, use_cache: bool) -> Result<Vec<OutputRecord>, StoreError> {
        let records = self.load(id)?;
        let pairs: Vec<(OutputRecord, bool)> =
            records.iter().map(|r| (r.to_output(), r.cached)).collect();
        Ok(filter_cached(pairs.iter().map(|(o, c)| (o, *c)), use_cache))
    }
}
