//! Durable named-array archives and the two-tier warm-start cache.
//!
//! An [`Archive`] is the on-disk form of a saved solver session: a flat map
//! from entry name to a scalar, a numeric array, or a small integer record.
//! Archives are stored as JSON (values always in double precision, so
//! archives are portable between single- and double-precision builds).
//!
//! A [`LayeredCache`] overlays a mutable in-memory tier on top of an
//! optional read-only archive tier. Lookup precedence is deterministic:
//! the override tier wins, then the archive, then a key error.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PogsError, PogsResult};
use crate::ffi::types::Float;

/// Fixed archive file extension, appended when a supplied name lacks it.
pub const ARCHIVE_EXT: &str = ".json";

/// One archive entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveValue {
    /// A single scalar (e.g. the penalty parameter).
    Scalar(f64),
    /// A numeric buffer (state vector, equilibration scales, factors).
    Array(Vec<f64>),
    /// A small named-integer record (cache production flags).
    Record(BTreeMap<String, i64>),
}

impl ArchiveValue {
    /// Build an array entry from solver-precision data.
    pub fn from_floats(data: &[Float]) -> Self {
        ArchiveValue::Array(data.iter().map(|&v| v as f64).collect())
    }

    /// View as an array, or report the actual kind.
    pub fn as_array(&self, key: &str) -> PogsResult<&[f64]> {
        match self {
            ArchiveValue::Array(data) => Ok(data),
            _ => Err(PogsError::WrongValueKind {
                key: key.to_owned(),
                expected: "an array",
            }),
        }
    }

    /// View as a scalar, or report the actual kind.
    pub fn as_scalar(&self, key: &str) -> PogsResult<f64> {
        match self {
            ArchiveValue::Scalar(v) => Ok(*v),
            _ => Err(PogsError::WrongValueKind {
                key: key.to_owned(),
                expected: "a scalar",
            }),
        }
    }

    /// View as a record, or report the actual kind.
    pub fn as_record(&self, key: &str) -> PogsResult<&BTreeMap<String, i64>> {
        match self {
            ArchiveValue::Record(map) => Ok(map),
            _ => Err(PogsError::WrongValueKind {
                key: key.to_owned(),
                expected: "a record",
            }),
        }
    }
}

/// Flat map of archive entries.
pub type ArchiveEntries = BTreeMap<String, ArchiveValue>;

/// A read-only named-value container loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Archive {
    entries: ArchiveEntries,
}

impl Archive {
    /// Read an archive from `path`.
    pub fn open(path: &Path) -> PogsResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write `entries` to a new file at `path`.
    ///
    /// Refuses to overwrite: an existing file is an error and is left
    /// untouched. The parent directory must already exist.
    pub fn write_new(path: &Path, entries: ArchiveEntries) -> PogsResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    PogsError::AlreadyExists(path.to_path_buf())
                } else {
                    PogsError::Io(e)
                }
            })?;
        let archive = Archive { entries };
        serde_json::to_writer_pretty(BufWriter::new(file), &archive)?;
        Ok(())
    }

    /// Membership test.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entry lookup.
    pub fn get(&self, key: &str) -> Option<&ArchiveValue> {
        self.entries.get(key)
    }
}

/// Append [`ARCHIVE_EXT`] unless the file name already carries it.
pub fn with_archive_ext(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(ARCHIVE_EXT) {
        path.to_path_buf()
    } else {
        let mut name = name.to_owned();
        name.push_str(ARCHIVE_EXT);
        path.with_file_name(name)
    }
}

/// Two-tier cache: a read-only archive overlaid by in-memory overrides.
///
/// Cloning copies the override tier and shares the archive tier, so a
/// cloned cache can diverge locally without re-reading the file.
#[derive(Debug, Clone, Default)]
pub struct LayeredCache {
    archive: Option<Arc<Archive>>,
    overrides: ArchiveEntries,
}

impl LayeredCache {
    /// Cache with neither tier populated.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cache backed by a loaded archive, with no overrides yet.
    pub fn from_archive(archive: Archive) -> Self {
        Self {
            archive: Some(Arc::new(archive)),
            overrides: ArchiveEntries::new(),
        }
    }

    /// Override-only cache (e.g. a freshly exported solver cache).
    pub fn from_entries(overrides: ArchiveEntries) -> Self {
        Self {
            archive: None,
            overrides,
        }
    }

    /// Cache with both tiers populated up front.
    pub fn with_overrides(archive: Archive, overrides: ArchiveEntries) -> Self {
        Self {
            archive: Some(Arc::new(archive)),
            overrides,
        }
    }

    /// True when either tier holds `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
            || self.archive.as_ref().is_some_and(|a| a.contains(key))
    }

    /// Lookup with override-wins precedence; key error when absent from both.
    pub fn get(&self, key: &str) -> PogsResult<&ArchiveValue> {
        if let Some(value) = self.overrides.get(key) {
            return Ok(value);
        }
        self.archive
            .as_ref()
            .and_then(|a| a.get(key))
            .ok_or_else(|| PogsError::MissingEntry(key.to_owned()))
    }

    /// Same resolution order as [`LayeredCache::get`], but returns `default`
    /// instead of erroring when the key is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a ArchiveValue) -> &'a ArchiveValue {
        match self.get(key) {
            Ok(value) => value,
            Err(_) => default,
        }
    }

    /// Array entry, or an error for a missing key or a non-array value.
    pub fn array(&self, key: &str) -> PogsResult<&[f64]> {
        self.get(key)?.as_array(key)
    }

    /// Scalar entry with a default for an absent key; a present entry of the
    /// wrong kind is still an error.
    pub fn scalar_or(&self, key: &str, default: f64) -> PogsResult<f64> {
        if !self.contains(key) {
            return Ok(default);
        }
        self.get(key)?.as_scalar(key)
    }

    /// Record entry lookup; `None` when absent.
    pub fn record(&self, key: &str) -> PogsResult<Option<&BTreeMap<String, i64>>> {
        if !self.contains(key) {
            return Ok(None);
        }
        Ok(Some(self.get(key)?.as_record(key)?))
    }

    /// Write into the override tier.
    pub fn insert(&mut self, key: impl Into<String>, value: ArchiveValue) {
        self.overrides.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn archive_with(key: &str, value: ArchiveValue) -> Archive {
        let mut entries = ArchiveEntries::new();
        entries.insert(key.to_owned(), value);
        Archive { entries }
    }

    #[test]
    fn test_override_wins_over_archive() {
        let mut cache =
            LayeredCache::from_archive(archive_with("rho", ArchiveValue::Scalar(2.0)));
        cache.insert("rho", ArchiveValue::Scalar(5.0));
        assert_eq!(cache.get("rho").unwrap().as_scalar("rho").unwrap(), 5.0);
    }

    #[test]
    fn test_archive_only_key_resolves() {
        let cache =
            LayeredCache::from_archive(archive_with("state", ArchiveValue::Array(vec![1.0, 2.0])));
        assert!(cache.contains("state"));
        assert_eq!(cache.array("state").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_missing_key_errors() {
        let cache = LayeredCache::empty();
        assert!(!cache.contains("state"));
        assert!(matches!(
            cache.get("state"),
            Err(PogsError::MissingEntry(_))
        ));
    }

    #[test]
    fn test_get_or_default() {
        let cache = LayeredCache::empty();
        let default = ArchiveValue::Scalar(1.0);
        assert_eq!(cache.get_or("rho", &default), &default);
        assert_eq!(cache.scalar_or("rho", 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_wrong_kind_errors() {
        let mut cache = LayeredCache::empty();
        cache.insert("state", ArchiveValue::Scalar(3.0));
        assert!(matches!(
            cache.array("state"),
            Err(PogsError::WrongValueKind { .. })
        ));
        assert!(matches!(
            cache.scalar_or("state", 1.0),
            Err(PogsError::WrongValueKind { .. })
        ));
    }

    #[test]
    fn test_clone_shares_archive_copies_overrides() {
        let mut cache =
            LayeredCache::from_archive(archive_with("rho", ArchiveValue::Scalar(2.0)));
        let mut fork = cache.clone();
        fork.insert("rho", ArchiveValue::Scalar(9.0));
        // The fork sees its override, the original still reads the archive.
        assert_eq!(fork.scalar_or("rho", 0.0).unwrap(), 9.0);
        assert_eq!(cache.scalar_or("rho", 0.0).unwrap(), 2.0);
        cache.insert("extra", ArchiveValue::Scalar(1.0));
        assert!(!fork.contains("extra"));
    }

    #[test]
    fn test_archive_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut entries = ArchiveEntries::new();
        entries.insert("rho".to_owned(), ArchiveValue::Scalar(1.25));
        entries.insert(
            "state".to_owned(),
            ArchiveValue::Array(vec![0.5, -1.0, 3.25]),
        );
        let mut flags = BTreeMap::new();
        flags.insert("factorized".to_owned(), 1);
        entries.insert("flags".to_owned(), ArchiveValue::Record(flags));

        Archive::write_new(&path, entries.clone()).unwrap();
        let archive = Archive::open(&path).unwrap();
        for (key, value) in &entries {
            assert_eq!(archive.get(key), Some(value), "entry `{key}` differs");
        }
    }

    #[test]
    fn test_write_new_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        Archive::write_new(&path, ArchiveEntries::new()).unwrap();

        let before = std::fs::read(&path).unwrap();
        let mut entries = ArchiveEntries::new();
        entries.insert("rho".to_owned(), ArchiveValue::Scalar(2.0));
        let err = Archive::write_new(&path, entries).unwrap_err();
        assert!(matches!(err, PogsError::AlreadyExists(_)));
        // The existing file is untouched.
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_write_new_requires_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("session.json");
        assert!(matches!(
            Archive::write_new(&path, ArchiveEntries::new()),
            Err(PogsError::Io(_))
        ));
    }

    #[test]
    fn test_with_archive_ext() {
        assert_eq!(
            with_archive_ext(Path::new("/tmp/run")),
            PathBuf::from("/tmp/run.json")
        );
        assert_eq!(
            with_archive_ext(Path::new("/tmp/run.json")),
            PathBuf::from("/tmp/run.json")
        );
        assert_eq!(
            with_archive_ext(Path::new("/tmp/run.v2")),
            PathBuf::from("/tmp/run.v2.json")
        );
    }
}
