//! Namespaced key-value contract and its implementations.
//!
//! The [`KvStore`] trait provides byte-level `get`/`set`/`delete` plus an
//! atomic [`compare_and_swap`](KvStore::compare_and_swap), which is all the
//! approval ledger needs to guarantee that a request is decided once.
//!
//! # Namespacing
//!
//! Every operation is scoped to a namespace. The ledger keeps primary
//! records under `{table}:requests` and its status index under
//! `{table}:status:{status}`; the session journal uses `{table}:sessions`.
//!
//! # Key ordering
//!
//! [`KvStore::list_keys`] makes no ordering promise. Callers that need an
//! order (the ledger's creation-time index) sort the returned keys.

mod memory;
mod scoped;
#[cfg(feature = "kv")]
mod surreal;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

pub use memory::MemoryKvStore;
pub use scoped::ScopedKvStore;
#[cfg(feature = "kv")]
pub use surreal::SurrealKvStore;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Namespaces must be non-empty and free of the null byte, which separates
/// namespace from key in composite keys.
pub(crate) fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() {
        return Err(StorageError::InvalidKey(
            "namespace must not be empty".into(),
        ));
    }
    if namespace.contains('\0') {
        return Err(StorageError::InvalidKey(
            "namespace must not contain null bytes".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "key must not contain null bytes".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Durable, namespaced byte store.
///
/// Every mutating call must be persisted before it returns, and a read issued
/// after a completed write must observe it.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by namespace and key.
    ///
    /// Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value for a namespace and key, overwriting any existing value.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key from a namespace.
    ///
    /// Returns `true` if the key existed and was deleted.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Check if a key exists in a namespace.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace, in no particular order.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Atomically replace the value at `key` if it currently equals
    /// `expected`.
    ///
    /// `expected = None` means "only if the key is absent", which makes this
    /// an insert-if-not-exists. Returns `true` if the swap happened and
    /// `false` if the current value did not match.
    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool>;
}
