//! Key/value backends
//!
//! Values are opaque strings keyed by namespaced names, the same contract a
//! browser's local storage offers. The file backend keeps every key in one
//! JSON document and replaces it on each change through a temp file, so a
//! failed write leaves the previous document in place.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use tenken_types::StorageError;

/// String key/value storage shared by every partition
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;

    /// Returns whether the key existed
    fn remove(&mut self, key: &str) -> Result<bool, StorageError>;

    /// Keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// File-backed store (`storage.json` in the store directory)
pub struct FileKeyValueStore {
    store_path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileKeyValueStore {
    /// Create or load a store
    ///
    /// An unreadable storage file is treated as empty.
    pub fn open(store_dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&store_dir).map_err(|e| StorageError::Io(e.to_string()))?;
        let store_path = store_dir.join("storage.json");

        let entries = if store_path.exists() {
            let file = File::open(&store_path).map_err(|e| StorageError::Io(e.to_string()))?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).unwrap_or_else(|e| {
                warn!("Ignoring unreadable storage file {}: {}", store_path.display(), e);
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self { store_path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Save store to disk
    fn save(&self) -> Result<(), StorageError> {
        replace_file(&self.store_path, |writer| {
            serde_json::to_writer_pretty(writer, &self.entries)
                .map_err(|e| StorageError::Io(e.to_string()))
        })
    }
}

/// Write a sibling temp file and rename it over `path`
///
/// `path` is untouched unless `write` and the flush both succeed.
fn replace_file<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<(), StorageError>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(dir).map_err(|e| StorageError::Io(e.to_string()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush().map_err(|e| StorageError::Io(e.to_string()))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::Io(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| StorageError::Io(e.error.to_string()))?;
    Ok(())
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// In-memory store with an optional byte quota
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail writes that would push total key+value size past `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota_bytes: Some(bytes),
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::Io(format!(
                    "quota exceeded writing {} ({} > {} bytes)",
                    key, needed, quota
                )));
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}
