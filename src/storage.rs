//! Durable key-value storage
//!
//! Values are string-keyed maps of string lists, which is all the favorites
//! record needs. The file-backed store keeps every key in one JSON object and
//! rewrites the whole file on each `set`.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::config;
use crate::error::{StorageError, StorageResult};

/// Mapping persisted under a single key
pub type StringListMap = BTreeMap<String, Vec<String>>;

pub trait KeyValueStore {
    /// The mapping stored under `key`, `None` if nothing is stored
    fn get(&self, key: &str) -> StorageResult<Option<StringListMap>>;

    /// Replace the mapping stored under `key`
    fn set(&mut self, key: &str, value: &StringListMap) -> StorageResult<()>;
}

/// In-memory store, used in tests and when persistence is not wanted
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, StringListMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<StringListMap>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &StringListMap) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// JSON file holding one object of key → mapping
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_DATA_HOME/resolution-change/favorites.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FAVORITES_FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file missing, treating as empty");
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_document(&self, document: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<StringListMap>> {
        let mut document = self.read_document()?;
        match document.remove(key) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|_| StorageError::Shape { key: key.to_string() }),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: &StringListMap) -> StorageResult<()> {
        let mut document = self.read_document()?;
        document.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_document(&document)?;
        debug!(path = %self.path.display(), key, "Store written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StringListMap {
        BTreeMap::from([("1".to_string(), vec!["1920x1080".to_string()])])
    }

    #[test]
    fn test_memory_store_get_set() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", &sample()).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/store.json");
        let mut store = JsonFileStore::new(&path);
        store.set("k", &sample()).unwrap();
        assert!(path.exists());
        assert_eq!(JsonFileStore::new(&path).get("k").unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_store_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"Other": {"a": ["b"]}, "Unrelated": 5}"#).unwrap();

        let mut store = JsonFileStore::new(&path);
        store.set("k", &sample()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Unrelated"], 5);
        assert_eq!(raw["Other"]["a"][0], "b");
        assert_eq!(raw["k"]["1"][0], "1920x1080");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"k": ["not", "a", "map"]}"#).unwrap();

        let err = JsonFileStore::new(&path).get("k").unwrap_err();
        assert!(matches!(err, StorageError::Shape { .. }));
    }

    #[test]
    fn test_file_store_corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ this is not json").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(matches!(store.set("k", &sample()), Err(StorageError::Json(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ this is not json");
    }
}
