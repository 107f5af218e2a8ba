//! Durable JSON store
//!
//! One file per namespace under the data directory, each holding a mapping of
//! guild id to entity id to entity. Every mutation rewrites the namespace in
//! full; there are no incremental writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use glob::glob;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// On-disk shape of a namespace: guild id -> entity id -> entity.
pub type GuildMap<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization to JSON failed
    #[error("failed to encode namespace {namespace}: {source}")]
    Encode {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// JSON-file persistence for all stateful namespaces
pub struct JsonStore {
    dir: PathBuf,
    /// Per-namespace write locks; a write must finish before the next write
    /// to the same file begins.
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_locks: DashMap::new(),
        }
    }

    /// Directory this store reads and writes
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    fn lock_for(&self, namespace: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    /// Load a namespace document, returning an empty map when the file does
    /// not exist yet. A file that fails to parse is logged and treated as
    /// empty rather than aborting startup.
    pub async fn load<T: DeserializeOwned>(&self, namespace: &str) -> GuildMap<T> {
        let path = self.file_path(namespace);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return GuildMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read namespace file");
                return GuildMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to decode namespace file, starting empty");
                GuildMap::new()
            }
        }
    }

    /// Serialize and write a namespace document in full.
    ///
    /// # Errors
    /// Returns a `StoreError` when the document cannot be encoded or the file
    /// cannot be written; callers must not report success on failure.
    pub async fn save<T: Serialize>(&self, namespace: &str, map: &GuildMap<T>) -> StoreResult<()> {
        let lock = self.lock_for(namespace);
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let body = serde_json::to_string_pretty(map).map_err(|source| StoreError::Encode {
            namespace: namespace.to_string(),
            source,
        })?;

        let path = self.file_path(namespace);
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    /// Read a namespace file as a raw JSON value for backup bundling.
    pub async fn snapshot(&self, namespace: &str) -> Option<serde_json::Value> {
        let path = self.file_path(namespace);
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Namespaces currently present on disk.
    pub fn namespaces(&self) -> Vec<String> {
        let pattern = self.dir.join("*.json");
        let Ok(paths) = glob(&pattern.to_string_lossy()) else {
            return Vec::new();
        };
        paths
            .flatten()
            .filter_map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entity {
        label: String,
        count: u32,
    }

    fn temp_store() -> JsonStore {
        let dir = std::env::temp_dir().join(format!("raffle-store-{}", uuid::Uuid::new_v4()));
        JsonStore::new(dir)
    }

    fn sample_map() -> GuildMap<Entity> {
        let mut map = GuildMap::new();
        let mut guild = BTreeMap::new();
        guild.insert(
            "111".to_string(),
            Entity {
                label: "first".to_string(),
                count: 3,
            },
        );
        map.insert("42".to_string(), guild);
        map
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = temp_store();
        let map = sample_map();

        store.save("widgets", &map).await.unwrap();
        let loaded: GuildMap<Entity> = store.load("widgets").await;

        assert_eq!(loaded, map);
    }

    #[tokio::test]
    async fn missing_namespace_loads_empty() {
        let store = temp_store();
        let loaded: GuildMap<Entity> = store.load("nothing_here").await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn corrupt_namespace_loads_empty() {
        let store = temp_store();
        tokio::fs::create_dir_all(store.dir()).await.unwrap();
        tokio::fs::write(store.dir().join("broken.json"), "{not json")
            .await
            .unwrap();

        let loaded: GuildMap<Entity> = store.load("broken").await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn namespaces_lists_saved_files() {
        let store = temp_store();
        store.save("alpha", &sample_map()).await.unwrap();
        store.save("beta", &sample_map()).await.unwrap();

        let mut names = store.namespaces();
        names.sort();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn snapshot_returns_raw_document() {
        let store = temp_store();
        store.save("alpha", &sample_map()).await.unwrap();

        let value = store.snapshot("alpha").await.unwrap();
        assert!(value.get("42").is_some());
        assert!(store.snapshot("missing").await.is_none());
    }
}
