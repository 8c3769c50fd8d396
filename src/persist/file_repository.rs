use super::repository::{PersistRepository, child_keys, delete_subtree};
use crate::core::{MetaError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Repository storing the whole keyspace as one JSON document on disk.
///
/// Every read goes to the file so changes made by other processes are seen.
/// Each write goes to a uniquely named temporary sibling that is then renamed
/// over the file, so readers never see a torn document and concurrent writers
/// never share a temporary file. Writes are serialized only within one
/// repository instance: writers in other processes may still overwrite each
/// other's changes.
#[derive(Debug)]
pub struct FilePersistRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePersistRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                MetaError::Serialization(format!("repository file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(MetaError::Persistence(format!(
                "Failed to read repository file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await.map_err(|e| {
            MetaError::Persistence(format!("Failed to create repository directory: {}", e))
        })?;
        let serialized = serde_json::to_vec_pretty(entries)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(".repository-")
                .suffix(".tmp")
                .tempfile_in(&dir)
                .map_err(|e| MetaError::Persistence(format!("Failed to create temp file: {}", e)))?;
            temp.write_all(&serialized)
                .and_then(|_| temp.as_file().sync_all())
                .map_err(|e| MetaError::Persistence(format!("Failed to write temp file: {}", e)))?;
            temp.persist(&path).map_err(|e| {
                MetaError::Persistence(format!("Failed to replace repository file: {}", e.error))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| MetaError::Persistence(format!("Repository write task failed: {}", e)))?
    }

    async fn modify<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        change(&mut entries);
        self.save(&entries).await
    }
}

#[async_trait]
impl PersistRepository for FilePersistRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn get_child_keys(&self, key: &str) -> Result<Vec<String>> {
        Ok(child_keys(&self.load().await?, key))
    }

    async fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.modify(|entries| delete_subtree(entries, key)).await
    }
}
