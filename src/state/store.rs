//! Blob persistence.
//!
//! The engine never touches files directly. Catalogs, interface
//! definitions and settings are read and written as named JSON blobs
//! through a [`BlobStore`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PipequeueError;

/// Read/write access to named blobs under an application-controlled root.
///
/// Names use `/` as a separator (e.g. `pipeline/daily`).
pub trait BlobStore: Send + Sync {
    /// Read a blob, or `None` if it doesn't exist.
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Create or replace a blob.
    fn write(&self, name: &str, content: &str) -> Result<()>;

    /// Names of the blobs directly under `dir`, sorted.
    fn list(&self, dir: &str) -> Result<Vec<String>>;
}

/// Blob store backed by `<root>/<name>.json` files.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.blob_path(name);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {:?}", path))
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        let path = self.blob_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.root.join(dir);
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&path).with_context(|| format!("Failed to list {:?}", path))? {
            let entry_path = entry?.path();
            if entry_path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = entry_path.file_stem().and_then(|s| s.to_str()) {
                    names.push(format!("{}/{}", dir, stem));
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, String>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blob, builder style.
    pub fn with_blob(self, name: &str, content: &str) -> Self {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(name.to_string(), content.to_string());
        }
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob store lock poisoned"))?;
        Ok(blobs.get(name).cloned())
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob store lock poisoned"))?;
        blobs.insert(name.to_string(), content.to_string());
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob store lock poisoned"))?;
        let prefix = format!("{}/", dir);
        Ok(blobs
            .keys()
            .filter(|k| k.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
            .cloned()
            .collect())
    }
}

/// Read and deserialize a JSON blob.
///
/// # Errors
///
/// Returns `ConfigParse` if the blob exists but doesn't deserialize.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    name: &str,
) -> crate::error::Result<Option<T>> {
    let Some(content) = store.read(name)? else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| PipequeueError::ConfigParse {
            name: name.to_string(),
            message: e.to_string(),
        })
}

/// Serialize a value as pretty JSON and write it.
pub fn write_json<T: Serialize>(
    store: &dyn BlobStore,
    name: &str,
    value: &T,
) -> crate::error::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize blob")?;
    store.write(name, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_blobs() {
        let temp = TempDir::new().unwrap();
        let store = FileBlobStore::new(temp.path());

        store.write("config", "{\"a\": 1}").unwrap();
        assert_eq!(store.read("config").unwrap().unwrap(), "{\"a\": 1}");
        assert!(temp.path().join("config.json").exists());
    }

    #[test]
    fn file_store_missing_blob_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FileBlobStore::new(temp.path());
        assert!(store.read("absent").unwrap().is_none());
    }

    #[test]
    fn file_store_creates_nested_directories() {
        let temp = TempDir::new().unwrap();
        let store = FileBlobStore::new(temp.path());

        store.write("pipeline/daily", "{}").unwrap();
        assert!(temp.path().join("pipeline").join("daily.json").exists());
    }

    #[test]
    fn file_store_lists_json_blobs_sorted() {
        let temp = TempDir::new().unwrap();
        let store = FileBlobStore::new(temp.path());
        store.write("pipeline/b", "{}").unwrap();
        store.write("pipeline/a", "{}").unwrap();
        fs::write(temp.path().join("pipeline").join("notes.txt"), "x").unwrap();

        assert_eq!(
            store.list("pipeline").unwrap(),
            vec!["pipeline/a".to_string(), "pipeline/b".to_string()]
        );
        assert!(store.list("missing").unwrap().is_empty());
    }

    #[test]
    fn memory_store_lists_direct_children_only() {
        let store = MemoryBlobStore::new()
            .with_blob("pipeline/a", "{}")
            .with_blob("pipeline/deep/b", "{}")
            .with_blob("config", "{}");

        assert_eq!(store.list("pipeline").unwrap(), vec!["pipeline/a".to_string()]);
    }

    #[test]
    fn read_json_reports_parse_errors_with_name() {
        let store = MemoryBlobStore::new().with_blob("config", "{not json");
        let err = read_json::<serde_json::Value>(&store, "config").unwrap_err();
        assert!(matches!(err, PipequeueError::ConfigParse { ref name, .. } if name == "config"));
    }

    #[test]
    fn write_json_then_read_json() {
        let store = MemoryBlobStore::new();
        write_json(&store, "numbers", &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&store, "numbers").unwrap().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
