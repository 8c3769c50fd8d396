use crate::core::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Hierarchical key-value store holding the persisted configuration.
///
/// Keys are `/`-separated absolute paths.
#[async_trait]
pub trait PersistRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Names of the direct children of `key`, sorted.
    async fn get_child_keys(&self, key: &str) -> Result<Vec<String>>;

    async fn persist(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key` and everything below it.
    async fn delete(&self, key: &str) -> Result<()>;
}

pub(crate) fn child_keys(entries: &BTreeMap<String, String>, key: &str) -> Vec<String> {
    let prefix = format!("{}/", key.trim_end_matches('/'));
    entries
        .range(prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&prefix))
        .filter_map(|(k, _)| k[prefix.len()..].split('/').next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn delete_subtree(entries: &mut BTreeMap<String, String>, key: &str) {
    let key = key.trim_end_matches('/');
    let prefix = format!("{}/", key);
    entries.retain(|k, _| k != key && !k.starts_with(&prefix));
}

/// Process-local repository, used by embedded nodes and tests.
#[derive(Debug, Default)]
pub struct MemoryPersistRepository {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryPersistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl PersistRepository for MemoryPersistRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_child_keys(&self, key: &str) -> Result<Vec<String>> {
        Ok(child_keys(&*self.entries.read().await, key))
    }

    async fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        delete_subtree(&mut *self.entries.write().await, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_keys_are_direct_children_only() {
        tokio_test::block_on(async {
            let repo = MemoryPersistRepository::new();
            repo.persist("/metadata/db_a/rules", "[]").await.unwrap();
            repo.persist("/metadata/db_a/data_sources", "{}").await.unwrap();
            repo.persist("/metadata/db_b/rules", "[]").await.unwrap();
            repo.persist("/metadata_other/x", "1").await.unwrap();

            assert_eq!(repo.get_child_keys("/metadata").await.unwrap(), vec!["db_a", "db_b"]);
            assert_eq!(
                repo.get_child_keys("/metadata/db_a").await.unwrap(),
                vec!["data_sources", "rules"]
            );
            assert!(repo.get_child_keys("/props").await.unwrap().is_empty());
        });
    }

    #[test]
    fn test_delete_removes_subtree() {
        tokio_test::block_on(async {
            let repo = MemoryPersistRepository::new();
            repo.persist("/metadata/db_a/rules", "[]").await.unwrap();
            repo.persist("/metadata/db_ab/rules", "[]").await.unwrap();
            repo.delete("/metadata/db_a").await.unwrap();

            assert_eq!(repo.get("/metadata/db_a/rules").await.unwrap(), None);
            assert_eq!(repo.get("/metadata/db_ab/rules").await.unwrap().as_deref(), Some("[]"));
            assert_eq!(repo.len().await, 1);
        });
    }
}
