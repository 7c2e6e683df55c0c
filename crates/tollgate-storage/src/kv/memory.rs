//! In-memory [`KvStore`] for tests and ephemeral daemons.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{KvStore, validate_key, validate_namespace};
use crate::error::{StorageError, StorageResult};

/// In-memory key-value store.
///
/// Keys are stored as `"{namespace}\0{key}"` in a single `HashMap`; every
/// compare-and-swap runs under one write lock.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> StorageResult<String> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok(format!("{namespace}\0{key}"))
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = Self::full_key(namespace, key)?;
        Ok(self.read()?.get(&full).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let full = Self::full_key(namespace, key)?;
        self.write()?.insert(full, value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        Ok(self.write()?.remove(&full).is_some())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        Ok(self.read()?.contains_key(&full))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let prefix = format!("{namespace}\0");
        Ok(self
            .read()?
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.write()?;
        if data.get(&full).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(full, value);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_set() {
        let store = MemoryKvStore::new();
        store.set("ns1", "key1", b"hello".to_vec()).await.unwrap();
        let val = store.get("ns1", "key1").await.unwrap();
        assert_eq!(val, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let store = MemoryKvStore::new();
        store.set("ns1", "k", b"v".to_vec()).await.unwrap();
        assert!(store.delete("ns1", "k").await.unwrap());
        assert!(!store.delete("ns1", "k").await.unwrap());
        assert!(!store.exists("ns1", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation() {
        let store = MemoryKvStore::new();
        store.set("ns1", "k", b"v1".to_vec()).await.unwrap();
        store.set("ns2", "k", b"v2".to_vec()).await.unwrap();
        store.set("ns10", "x", b"v3".to_vec()).await.unwrap();
        assert_eq!(store.get("ns1", "k").await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.list_keys("ns1").await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_memory_cas_insert_if_absent() {
        let store = MemoryKvStore::new();
        assert!(
            store
                .compare_and_swap("ns", "k", None, b"first".to_vec())
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("ns", "k", None, b"second".to_vec())
                .await
                .unwrap()
        );
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_cas_requires_current_value() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"v1".to_vec()).await.unwrap();

        let stale = store
            .compare_and_swap("ns", "k", Some(b"v0"), b"v2".to_vec())
            .await
            .unwrap();
        assert!(!stale);

        let fresh = store
            .compare_and_swap("ns", "k", Some(b"v1"), b"v2".to_vec())
            .await
            .unwrap();
        assert!(fresh);
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_rejects_invalid_keys() {
        let store = MemoryKvStore::new();
        assert!(store.get("", "k").await.is_err());
        assert!(store.set("ns", "bad\0key", Vec::new()).await.is_err());
    }
}
