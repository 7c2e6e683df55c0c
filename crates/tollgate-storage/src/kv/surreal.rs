//! Persistent [`KvStore`] backed by `SurrealKV`.

use async_trait::async_trait;
use tracing::debug;

use super::{KvStore, validate_key, validate_namespace};
use crate::error::{StorageError, StorageResult};

/// Build the composite key `"{namespace}\0{key}"` as bytes.
fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len().saturating_add(key.len()).saturating_add(1));
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// `["{namespace}\0", "{namespace}\x01")` covers exactly the namespace.
fn namespace_range(namespace: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = namespace.as_bytes().to_vec();
    let mut end = start.clone();
    start.push(0);
    end.push(1);
    (start, end)
}

fn map_kv_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

/// Persistent key-value store backed by `SurrealKV`.
///
/// ACID-compliant embedded LSM-tree storage. Every write commits its own
/// transaction before returning, so the approval ledger survives a crash
/// between any two calls.
///
/// ```rust,ignore
/// use tollgate_storage::SurrealKvStore;
///
/// let store = SurrealKvStore::open("./data/ledger")?;
/// store.set("hitl-approvals:requests", "S1/...", bytes).await?;
/// ```
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

impl SurrealKvStore {
    /// Open a persistent KV store at the given directory path.
    ///
    /// Creates the directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { tree })
    }

    /// Close the store, flushing any pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree
            .close()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))
    }

    fn read_current(&self, ck: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        tx.get(ck).map_err(|ref e| map_kv_err(e))
    }
}

#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        self.read_current(&composite_key(namespace, key))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        tx.set(&ck, &value).map_err(|ref e| map_kv_err(e))?;
        tx.commit().await.map_err(|ref e| map_kv_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        let existed = tx.get(&ck).map_err(|ref e| map_kv_err(e))?.is_some();
        if existed {
            tx.delete(&ck).map_err(|ref e| map_kv_err(e))?;
            tx.commit().await.map_err(|ref e| map_kv_err(e))?;
        }
        Ok(existed)
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let (start, end) = namespace_range(namespace);
        let prefix_len = namespace.len().saturating_add(1);

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| map_kv_err(e))?;
        iter.seek_first().map_err(|ref e| map_kv_err(e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw_key = iter.key();
            if let Some(suffix) = raw_key.get(prefix_len..) {
                if let Ok(key_str) = std::str::from_utf8(suffix) {
                    if !key_str.is_empty() {
                        keys.push(key_str.to_string());
                    }
                }
            }
            iter.next().map_err(|ref e| map_kv_err(e))?;
        }
        Ok(keys)
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let ck = composite_key(namespace, key);

        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        let current = tx.get(&ck).map_err(|ref e| map_kv_err(e))?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        tx.set(&ck, &value).map_err(|ref e| map_kv_err(e))?;

        match tx.commit().await {
            Ok(()) => Ok(true),
            Err(e) => {
                // A write-write conflict means a concurrent swap committed
                // first. If the stored value moved away from `expected`, we
                // lost the race; anything else is a genuine failure.
                let now = self.read_current(&ck)?;
                if now.as_deref() == expected {
                    Err(map_kv_err(&e))
                } else {
                    debug!(namespace, key, "compare-and-swap lost a commit race");
                    Ok(false)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (SurrealKvStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SurrealKvStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_surreal_get_set_delete() {
        let (store, _dir) = make_store();
        store.set("ns1", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("ns1", "k").await.unwrap(), Some(b"v".to_vec()));
        assert!(store.delete("ns1", "k").await.unwrap());
        assert!(store.get("ns1", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_surreal_list_keys_is_namespace_scoped() {
        let (store, _dir) = make_store();
        store.set("ns1", "a", b"1".to_vec()).await.unwrap();
        store.set("ns1", "b", b"2".to_vec()).await.unwrap();
        store.set("ns2", "c", b"3".to_vec()).await.unwrap();
        let mut keys = store.list_keys("ns1").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_surreal_compare_and_swap() {
        let (store, _dir) = make_store();
        assert!(
            store
                .compare_and_swap("ns", "k", None, b"v1".to_vec())
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("ns", "k", None, b"v2".to_vec())
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_swap("ns", "k", Some(b"v1"), b"v2".to_vec())
                .await
                .unwrap()
        );
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_surreal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SurrealKvStore::open(dir.path()).unwrap();
            store.set("ns", "k", b"durable".to_vec()).await.unwrap();
            store.close().await.unwrap();
        }
        let store = SurrealKvStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("ns", "k").await.unwrap(),
            Some(b"durable".to_vec())
        );
    }
}
