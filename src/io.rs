//! File access for directory-backed stores: enumeration discovery and
//! line-oriented reading of enumeration files, memory-mapped above a size
//! threshold.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use memmap2::Mmap;

use crate::record::{StoredRecord, parse_record_line};

/// Files at or above this size are read through mmap.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

/// Extension of enumeration files inside a store directory.
pub const ENUMERATION_EXT: &str = "json";

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

/// List `(id, path)` for every enumeration file in `dir`, sorted by id.
pub fn list_enumeration_files<P: AsRef<Path>>(dir: P) -> Result<Vec<(String, PathBuf)>> {
    let dir = dir.as_ref();
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir {}", dir.display()))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ENUMERATION_EXT)
        {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            found.push((stem.to_string(), path.clone()));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

fn iter_lines_bufread<P: AsRef<Path>>(path: P) -> Result<LineIter> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    Ok(Box::new(BufReader::new(file).lines()))
}

fn iter_lines_mmap<P: AsRef<Path>>(path: P) -> Result<LineIter> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    // The store is read-only for the lifetime of a report run
    let mmap =
        unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.as_ref().display()))?;
    Ok(Box::new(MmapLines { mmap, pos: 0 }))
}

struct MmapLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MmapLines {
    type Item = io::Result<String>;
    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        let end = match memchr::memchr(b'\n', &data[start..]) {
            Some(off) => start + off,
            None => data.len(),
        };
        self.pos = end + 1;
        Some(Ok(line_from_bytes(&data[start..end])))
    }
}

fn line_from_bytes(bytes: &[u8]) -> String {
    let slice = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(slice).into_owned()
}

/// Choose mmap or buffered reading and return an iterator over lines.
pub fn iter_lines_auto<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<LineIter> {
    let meta =
        std::fs::metadata(&path).with_context(|| format!("stat {}", path.as_ref().display()))?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        iter_lines_mmap(path)
    } else {
        iter_lines_bufread(path)
    }
}

/// Records parsed from one enumeration file plus the number of lines skipped.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<StoredRecord>,
    pub malformed: usize,
}

/// Read every record of an enumeration file in file order. Malformed lines
/// are skipped and counted.
pub fn read_records<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<LoadedRecords> {
    let path = path.as_ref();
    let mut loaded = LoadedRecords::default();
    for line in iter_lines_auto(path, threshold_bytes)? {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_record_line(trimmed) {
            Ok(rec) => loaded.records.push(rec),
            Err(e) => {
                warn!("{}: skipping {}", path.display(), e);
                loaded.malformed += 1;
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const LINE_A: &str = r#"{"name":"a.example.com","domain":"example.com","timestamp":"2019-01-02T03:04:05Z"}"#;
    const LINE_B: &str = r#"{"name":"b.example.com","domain":"example.com","timestamp":"2019-01-02T03:05:05Z"}"#;

    #[test]
    fn mmap_and_bufread_agree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e1.json");
        {
            let mut f = File::create(&path).unwrap();
            write!(f, "{}\r\n\ngarbage\n{}", LINE_A, LINE_B).unwrap();
        }
        let via_mmap = read_records(&path, 1).unwrap();
        let via_buf = read_records(&path, u64::MAX).unwrap();
        assert_eq!(via_mmap.records.len(), 2);
        assert_eq!(via_mmap.malformed, 1);
        assert_eq!(via_buf.records.len(), 2);
        assert_eq!(via_buf.malformed, 1);
        assert_eq!(via_mmap.records[1].name, "b.example.com");
    }

    #[test]
    fn skips_and_counts_bad_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e2.json");
        let blank = r#"{"name":"  ","domain":"example.com","timestamp":"2019-01-02T03:04:05Z"}"#;
        let bad_ts = r#"{"name":"x.example.com","domain":"example.com","timestamp":"nope"}"#;
        let cached = r#"{"name":"c.example.com","domain":"example.com","timestamp":"2019-01-03T00:00:00Z","cached":true}"#;
        std::fs::write(
            &path,
            format!("\nnot json\n{}\n{}\n{}\n{}\n", LINE_A, blank, bad_ts, cached),
        )
        .unwrap();
        let loaded = read_records(&path, u64::MAX).unwrap();
        assert_eq!(loaded.malformed, 3);
        let names: Vec<&str> = loaded.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.example.com", "c.example.com"]);
        assert!(loaded.records[1].cached);
    }

    #[test]
    fn lists_only_enumeration_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), LINE_A).unwrap();
        std::fs::write(dir.path().join("a.json"), LINE_B).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("c.json")).unwrap();
        let ids: Vec<String> = list_enumeration_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(list_enumeration_files(dir.path().join("nope")).is_err());
    }
}
