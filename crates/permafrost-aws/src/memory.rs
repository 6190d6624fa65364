//! In-memory object store for tests and local runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use permafrost_core::{Error, ObjectStore, Result};

/// Object store backed by a map, keyed by (bucket, key).
///
/// Deletion failures can be injected to exercise the non-fatal cleanup
/// paths of the orchestrators.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delete fail with a transport error.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// All stored keys for a bucket, in order.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of stored objects across all buckets.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self
            .objects
            .read()
            .await
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no such object s3://{}/{}", bucket, key)))
    }

    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!(
                "delete s3://{}/{}: injected failure",
                bucket, key
            )));
        }
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_exists_delete() {
        let store = MemoryObjectStore::new();
        store.put("b", "p/ddl", b"CREATE TABLE").await.unwrap();

        assert!(store.exists("b", "p/ddl").await.unwrap());
        assert_eq!(store.get("b", "p/ddl").await.unwrap(), b"CREATE TABLE");

        store.delete("b", "p/ddl").await.unwrap();
        assert!(!store.exists("b", "p/ddl").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_prefix_scoped() {
        let store = MemoryObjectStore::new();
        store.put("b", "p/ddl", b"x").await.unwrap();
        store.put("b", "p/manifest", b"x").await.unwrap();
        store.put("b", "q/ddl", b"x").await.unwrap();
        store.put("other", "p/ddl", b"x").await.unwrap();

        let keys = store.list("b", "p/").await.unwrap();
        assert_eq!(keys, vec!["p/ddl".to_string(), "p/manifest".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_delete_failure() {
        let store = MemoryObjectStore::new();
        store.put("b", "p/ddl", b"x").await.unwrap();
        store.set_fail_deletes(true);

        assert!(store.delete("b", "p/ddl").await.is_err());
        assert!(store.exists("b", "p/ddl").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_transport_error() {
        let store = MemoryObjectStore::new();
        let err = store.get("b", "nope").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
