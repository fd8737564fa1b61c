//! Durable keyed storage of opaque JSON values.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

/// Keyed storage holding one JSON value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

/// All keys live in a single JSON object file.
///
/// Every `set` rewrites the whole file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow!("{} is not a JSON object", self.path.display())),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        // Unreadable existing content is replaced rather than blocking the write.
        let mut all = self.read_all().unwrap_or_else(|e| {
            crate::log(&format!("Storage: discarding unreadable data: {:#}", e));
            Map::new()
        });
        all.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(all))
            .context("Failed to serialize storage")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory storage for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: std::collections::HashMap<String, Value>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("storage.json"));
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_set_preserves_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        let mut store = JsonFileStore::new(&path);

        store.set("encounters", json!([1, 2])).unwrap();
        store.set("drafts", json!({"a": 1})).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("encounters").unwrap(), Some(json!([1, 2])));
        assert_eq!(reopened.get("drafts").unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn test_corrupt_file_is_an_error_on_read_and_replaced_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(store.get("drafts").is_err());

        store.set("drafts", json!([])).unwrap();
        assert_eq!(store.get("drafts").unwrap(), Some(json!([])));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::default();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", json!("v")).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!("v")));
    }
}
