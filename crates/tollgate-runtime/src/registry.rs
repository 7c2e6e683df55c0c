//! In-memory session registry.
//!
//! The registry is the single source of truth for "does this session exist"
//! within one process. It is not durable: after a restart the approval
//! ledger survives but every registered session is gone, and re-attaching a
//! computation to its ledger records is not supported.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::RwLock;

use tollgate_core::SessionId;

use crate::error::{RuntimeError, RuntimeResult};
use crate::session::SessionHandle;

/// Map of session IDs to live handles.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateSession`] if the ID is taken.
    pub async fn insert(&self, handle: Arc<SessionHandle>) -> RuntimeResult<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(handle.id().clone()) {
            Entry::Occupied(e) => Err(RuntimeError::DuplicateSession {
                session_id: e.key().clone(),
            }),
            Entry::Vacant(v) => {
                v.insert(handle);
                Ok(())
            },
        }
    }

    /// Look up a session.
    pub async fn get(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Look up a session or fail with [`RuntimeError::SessionNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionNotFound`] if the ID is unknown.
    pub async fn require(&self, session_id: &SessionId) -> RuntimeResult<Arc<SessionHandle>> {
        self.get(session_id)
            .await
            .ok_or_else(|| RuntimeError::SessionNotFound {
                session_id: session_id.clone(),
            })
    }

    /// Remove a session. Only explicit cleanup calls this.
    pub async fn remove(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.write().await.remove(session_id)
    }

    /// Every registered session ID, sorted.
    pub async fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clone out every handle so callers can inspect them without holding
    /// the registry lock.
    pub async fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::SessionJournal;
    use crate::liveness::LivenessReporter;
    use crate::session::SessionCell;
    use tollgate_approval::{ActionClassifier, ApprovalLedger, InterruptGate, SuspensionPoint};
    use tollgate_storage::MemoryKvStore;

    fn handle(id: &str) -> Arc<SessionHandle> {
        let cell = Arc::new(SessionCell::new(
            SessionId::parse(id).unwrap(),
            serde_json::Value::Null,
            Arc::new(LivenessReporter::new()),
            SessionJournal::disabled(),
        ));
        let ledger = ApprovalLedger::new(Arc::new(MemoryKvStore::new()), "t");
        let gate = InterruptGate::new(
            cell.id().clone(),
            Arc::new(ActionClassifier::default()),
            ledger,
            Arc::clone(&cell) as Arc<dyn SuspensionPoint>,
        );
        Arc::new(SessionHandle::new(cell, gate))
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let registry = SessionRegistry::new();
        registry.insert(handle("S1")).await.unwrap();
        let err = registry.insert(handle("S1")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateSession { .. }));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_require_and_remove() {
        let registry = SessionRegistry::new();
        let id = SessionId::parse("S1").unwrap();
        assert!(registry.require(&id).await.unwrap_err().is_not_found());

        registry.insert(handle("S1")).await.unwrap();
        registry.insert(handle("S2")).await.unwrap();
        assert_eq!(registry.require(&id).await.unwrap().id(), &id);
        assert_eq!(
            registry.ids().await,
            vec![id.clone(), SessionId::parse("S2").unwrap()]
        );

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.get(&id).await.is_none());
        assert!(!registry.is_empty().await);
    }
}
