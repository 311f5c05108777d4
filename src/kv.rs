use crate::{
    config::{Config, StorageBackend},
    error::ApiError,
};
use serde_json::Value;
use std::{collections::BTreeMap, path::PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

type Entries = BTreeMap<String, Value>;

/// String-keyed JSON document store. Absent keys read as `None`; concurrent
/// writers to one key overwrite each other.
#[derive(Debug)]
pub enum KvStore {
    Memory(MemoryKv),
    File(FileKv),
}

impl KvStore {
    #[instrument(skip(config), fields(backend = ?config.storage_backend, data_dir = %config.data_dir.display()))]
    pub async fn from_config(config: &Config) -> Result<Self, ApiError> {
        match config.storage_backend {
            StorageBackend::Memory => {
                debug!("initialized in-memory key-value store");
                Ok(Self::memory())
            }
            StorageBackend::File => {
                tokio::fs::create_dir_all(&config.data_dir).await?;
                let path = config.data_dir.join("kv.json");
                let backend = FileKv::open(path).await?;
                Ok(Self::File(backend))
            }
        }
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryKv::default())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, ApiError> {
        match self {
            Self::Memory(backend) => Ok(backend.get(key).await),
            Self::File(backend) => Ok(backend.get(key).await),
        }
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<(), ApiError> {
        match self {
            Self::Memory(backend) => {
                backend.set(key, value).await;
                Ok(())
            }
            Self::File(backend) => backend.set(key, value).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        match self {
            Self::Memory(backend) => {
                backend.delete(key).await;
                Ok(())
            }
            Self::File(backend) => backend.delete(key).await,
        }
    }

    pub async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, ApiError> {
        match self {
            Self::Memory(backend) => Ok(backend.get_by_prefix(prefix).await),
            Self::File(backend) => Ok(backend.get_by_prefix(prefix).await),
        }
    }
}

fn scan_prefix(entries: &Entries, prefix: &str) -> Vec<Value> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(_, value)| value.clone())
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<Entries>,
}

impl MemoryKv {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn get_by_prefix(&self, prefix: &str) -> Vec<Value> {
        scan_prefix(&*self.entries.read().await, prefix)
    }
}

/// Map persisted as a single JSON snapshot; every mutation rewrites it.
#[derive(Debug)]
pub struct FileKv {
    entries: RwLock<Entries>,
    path: PathBuf,
}

impl FileKv {
    pub async fn open(path: PathBuf) -> Result<Self, ApiError> {
        let entries = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let bytes = tokio::fs::read(&path).await?;
            if bytes.is_empty() {
                Entries::new()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            Entries::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "opened file key-value store");
        Ok(Self {
            entries: RwLock::new(entries),
            path,
        })
    }

    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ApiError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Vec<Value> {
        scan_prefix(&*self.entries.read().await, prefix)
    }

    // Called with the write lock held so snapshots land in mutation order.
    // The live map only changes once the snapshot is on disk.
    async fn persist(&self, entries: &Entries) -> Result<(), ApiError> {
        let tmp_file = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp_file, bytes).await?;
        tokio::fs::rename(&tmp_file, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FileKv, KvStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn absent_key_reads_as_none() {
        let kv = KvStore::memory();
        assert!(kv.get("pessoa:missing").await.expect("get").is_none());
        kv.delete("pessoa:missing").await.expect("delete absent");
    }

    #[tokio::test]
    async fn prefix_scan_stays_inside_prefix() {
        let kv = KvStore::memory();
        kv.set("boletim:1", json!({"id": "1"})).await.expect("set");
        kv.set("boletim:numero:BO-1", json!("1")).await.expect("set");
        kv.set("boletins", json!("outside")).await.expect("set");
        kv.set("pessoa:1", json!({"id": "1"})).await.expect("set");

        let values = kv.get_by_prefix("boletim:").await.expect("scan");
        assert_eq!(values.len(), 2);
        assert!(!values.contains(&json!("outside")));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let kv = KvStore::memory();
        kv.set("log:1", json!({"acao": "A"})).await.expect("set");
        kv.set("log:1", json!({"acao": "B"})).await.expect("set");
        assert_eq!(
            kv.get("log:1").await.expect("get"),
            Some(json!({"acao": "B"}))
        );
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("kv.json");
        {
            let kv = KvStore::File(FileKv::open(path.clone()).await.expect("open"));
            kv.set("pessoa:1", json!({"id": "1", "nome": "Ana"}))
                .await
                .expect("set");
            kv.set("pessoa:2", json!({"id": "2", "nome": "Rui"}))
                .await
                .expect("set");
            kv.delete("pessoa:2").await.expect("delete");
        }

        let reopened = KvStore::File(FileKv::open(path).await.expect("reopen"));
        assert_eq!(
            reopened.get("pessoa:1").await.expect("get"),
            Some(json!({"id": "1", "nome": "Ana"}))
        );
        assert!(reopened.get("pessoa:2").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn failed_snapshot_leaves_live_map_untouched() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("kv.json");
        let kv = KvStore::File(FileKv::open(path.clone()).await.expect("open"));
        kv.set("pessoa:1", json!({"id": "1", "nome": "Ana"}))
            .await
            .expect("set");

        tokio::fs::remove_file(&path).await.expect("remove snapshot");
        tokio::fs::create_dir(&path).await.expect("dir in place of snapshot");
        tokio::fs::write(path.join("occupied"), b"x")
            .await
            .expect("occupy dir");

        assert!(
            kv.set("pessoa:2", json!({"id": "2", "nome": "Rui"}))
                .await
                .is_err()
        );
        assert!(kv.get("pessoa:2").await.expect("get").is_none());

        assert!(kv.delete("pessoa:1").await.is_err());
        assert_eq!(
            kv.get("pessoa:1").await.expect("get"),
            Some(json!({"id": "1", "nome": "Ana"}))
        );
    }
}
