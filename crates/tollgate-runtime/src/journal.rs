//! Durable per-session snapshots.
//!
//! The registry is in-memory only. The journal records each session's last
//! known state and outcome in `{table}:sessions` so that `status` and
//! `result` can still answer for sessions that are no longer registered,
//! for instance after a restart. It never re-attaches a computation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tollgate_core::{RequestId, RunnerState, SessionId, TaskId, Timestamp};
use tollgate_storage::ScopedKvStore;

use crate::error::{RuntimeError, RuntimeResult};
use crate::session::TaskOutcome;

/// Last recorded view of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The session.
    pub session_id: SessionId,
    /// Background task handle.
    pub task_id: TaskId,
    /// State at the time of the snapshot.
    pub state: RunnerState,
    /// Initial input passed to `start`.
    pub input: Value,
    /// Request the session was blocked on, if suspended.
    pub pending_request: Option<RequestId>,
    /// Terminal outcome, if finished.
    pub outcome: Option<TaskOutcome>,
    /// When the session started.
    pub started_at: Timestamp,
    /// When the snapshot was taken.
    pub updated_at: Timestamp,
}

/// Best-effort writer and reader of [`SessionSnapshot`]s.
#[derive(Debug, Clone)]
pub struct SessionJournal {
    store: Option<ScopedKvStore>,
}

impl SessionJournal {
    /// Journal into `store`.
    #[must_use]
    pub fn new(store: ScopedKvStore) -> Self {
        Self { store: Some(store) }
    }

    /// A journal that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Persist a snapshot. Failures are logged, never surfaced: the ledger,
    /// not the journal, is the source of truth for approvals.
    pub async fn record(&self, snapshot: &SessionSnapshot) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.set_json(snapshot.session_id.as_str(), snapshot).await {
            warn!(session_id = %snapshot.session_id, "Failed to journal session snapshot: {e}");
        }
    }

    /// Load the last snapshot for a session.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Ledger`] if the store fails.
    pub async fn load(&self, session_id: &SessionId) -> RuntimeResult<Option<SessionSnapshot>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        store
            .get_json(session_id.as_str())
            .await
            .map_err(|e| RuntimeError::Ledger(e.to_string()))
    }
}
