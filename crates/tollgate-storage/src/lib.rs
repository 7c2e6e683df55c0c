//! Tollgate Storage - the durable key-value contract behind the approval ledger.
//!
//! The orchestrator treats durable storage as a minimal namespaced
//! byte-level store ([`KvStore`]). Anything that can offer atomic
//! single-key compare-and-swap can back the ledger.
//!
//! # Backends
//!
//! | Backend | Durability | Use |
//! |---------|------------|-----|
//! | [`MemoryKvStore`] | process lifetime | tests, ephemeral daemons |
//! | `SurrealKvStore` | on disk, ACID | production (feature **`kv`**) |
//!
//! # Feature Flags
//!
//! - **`kv`**: `SurrealKV` embedded LSM-tree store

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
