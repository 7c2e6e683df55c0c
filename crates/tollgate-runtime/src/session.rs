//! Per-session runner state.
//!
//! Each session owns a [`SessionCell`]: its mutable state behind one async
//! mutex, so no two tasks transition the same session concurrently. The cell
//! is also the session's [`SuspensionPoint`]: a gated computation parks on a
//! oneshot channel stored in the cell, and `resume` wakes it by sending the
//! resolved ledger record through that channel exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, oneshot};
use tracing::{info, warn};

use tollgate_approval::{ApprovalRecord, GateError, GateResult, InterruptGate, SuspensionPoint};
use tollgate_core::{RequestId, RunnerState, SessionId, TaskId, Timestamp};

use crate::journal::{SessionJournal, SessionSnapshot};
use crate::liveness::LivenessReporter;

/// Final outcome of a session's computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The computation returned normally.
    Completed {
        /// Value returned by the computation.
        result: Value,
        /// When it finished.
        finished_at: Timestamp,
    },
    /// The computation failed, panicked, or was abandoned.
    Failed {
        /// Description of the failure.
        error: String,
        /// When it failed.
        finished_at: Timestamp,
    },
}

impl TaskOutcome {
    /// A successful outcome stamped now.
    #[must_use]
    pub fn completed(result: Value) -> Self {
        Self::Completed {
            result,
            finished_at: Timestamp::now(),
        }
    }

    /// A failed outcome stamped now.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            finished_at: Timestamp::now(),
        }
    }

    /// The terminal state this outcome puts a session in.
    #[must_use]
    pub fn state(&self) -> RunnerState {
        match self {
            Self::Completed { .. } => RunnerState::Completed,
            Self::Failed { .. } => RunnerState::Failed,
        }
    }
}

/// Point-in-time view of a session returned by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// The session.
    pub session_id: SessionId,
    /// Current state.
    pub state: RunnerState,
    /// Request the session is blocked on, if suspended.
    pub pending_request: Option<RequestId>,
    /// Action awaiting approval, if suspended.
    pub pending_action: Option<String>,
    /// Actions trusted for the rest of the session.
    pub trusted_actions: Vec<String>,
    /// When the session started.
    pub started_at: Timestamp,
    /// Last transition.
    pub updated_at: Timestamp,
    /// `false` when answered from the journal rather than the live registry.
    pub in_memory: bool,
}

impl SessionStatus {
    /// Build a status from a journal snapshot of an unregistered session.
    #[must_use]
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            state: snapshot.state,
            pending_request: snapshot.pending_request,
            pending_action: None,
            trusted_actions: Vec::new(),
            started_at: snapshot.started_at,
            updated_at: snapshot.updated_at,
            in_memory: false,
        }
    }
}

/// A computation parked at the gate.
#[derive(Debug)]
pub(crate) struct Parked {
    pub(crate) request_id: RequestId,
    pub(crate) action: String,
    pub(crate) since: Timestamp,
    pub(crate) wake: oneshot::Sender<ApprovalRecord>,
}

/// Mutable state of one session, guarded by [`SessionCell`]'s mutex.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    pub(crate) state: RunnerState,
    pub(crate) parked: Option<Parked>,
    pub(crate) outcome: Option<TaskOutcome>,
    pub(crate) updated_at: Timestamp,
}

/// Shared state of one session and its suspension point.
pub struct SessionCell {
    id: SessionId,
    task_id: TaskId,
    started_at: Timestamp,
    input: Value,
    slot: Mutex<SessionSlot>,
    liveness: Arc<LivenessReporter>,
    journal: SessionJournal,
}

impl std::fmt::Debug for SessionCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCell")
            .field("id", &self.id)
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

impl SessionCell {
    pub(crate) fn new(
        id: SessionId,
        input: Value,
        liveness: Arc<LivenessReporter>,
        journal: SessionJournal,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            task_id: TaskId::new(),
            started_at: now,
            input,
            slot: Mutex::new(SessionSlot {
                state: RunnerState::Running,
                parked: None,
                outcome: None,
                updated_at: now,
            }),
            liveness,
            journal,
        }
    }

    /// The session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The background task handle.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// When the session started.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Lock the session for a transition.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().await
    }

    /// Move the locked slot to `to`, keeping liveness and the journal in step.
    pub(crate) async fn transition(&self, slot: &mut SessionSlot, to: RunnerState) {
        let from = slot.state;
        slot.state = to;
        slot.updated_at = Timestamp::now();
        self.liveness.transition(Some(from), to);
        self.journal.record(&self.snapshot(slot)).await;
    }

    pub(crate) fn snapshot(&self, slot: &SessionSlot) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            task_id: self.task_id,
            state: slot.state,
            input: self.input.clone(),
            pending_request: slot.parked.as_ref().map(|p| p.request_id),
            outcome: slot.outcome.clone(),
            started_at: self.started_at,
            updated_at: slot.updated_at,
        }
    }

    /// Record the computation's terminal outcome.
    ///
    /// Ignored if the session already reached a terminal state, for
    /// example after being abandoned.
    pub(crate) async fn finish(&self, outcome: TaskOutcome) {
        let mut slot = self.lock().await;
        if slot.state.is_terminal() {
            return;
        }
        let to = outcome.state();
        match &outcome {
            TaskOutcome::Completed { .. } => info!(session_id = %self.id, "Session completed"),
            TaskOutcome::Failed { error, .. } => {
                warn!(session_id = %self.id, "Session failed: {error}");
            },
        }
        slot.parked = None;
        slot.outcome = Some(outcome);
        self.transition(&mut slot, to).await;
    }

    /// Current state.
    pub async fn state(&self) -> RunnerState {
        self.lock().await.state
    }

    /// Stored outcome, once terminal.
    pub async fn outcome(&self) -> Option<TaskOutcome> {
        self.lock().await.outcome.clone()
    }
}

#[async_trait]
impl SuspensionPoint for SessionCell {
    async fn suspend(&self, pending: &ApprovalRecord) -> GateResult<ApprovalRecord> {
        let request_id = pending.request_id;
        let (wake, woken) = oneshot::channel();
        {
            let mut slot = self.lock().await;
            if slot.state != RunnerState::Running || slot.parked.is_some() {
                return Err(GateError::Abandoned { request_id });
            }
            slot.parked = Some(Parked {
                request_id,
                action: pending.reason.action.clone(),
                since: Timestamp::now(),
                wake,
            });
            self.transition(&mut slot, RunnerState::SuspendedPendingApproval)
                .await;
        }
        info!(
            session_id = %self.id,
            request_id = %request_id,
            action = %pending.reason.action,
            "Session suspended pending approval"
        );

        woken.await.map_err(|_| GateError::Abandoned { request_id })
    }
}

/// Live handle to a registered session.
#[derive(Debug)]
pub struct SessionHandle {
    cell: Arc<SessionCell>,
    gate: InterruptGate,
}

impl SessionHandle {
    pub(crate) fn new(cell: Arc<SessionCell>, gate: InterruptGate) -> Self {
        Self { cell, gate }
    }

    /// The session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        self.cell.id()
    }

    /// The session's state cell.
    #[must_use]
    pub fn cell(&self) -> &Arc<SessionCell> {
        &self.cell
    }

    /// The session's interrupt gate.
    #[must_use]
    pub fn gate(&self) -> &InterruptGate {
        &self.gate
    }

    /// Snapshot the session for `status`.
    pub async fn status(&self) -> SessionStatus {
        let slot = self.cell.lock().await;
        SessionStatus {
            session_id: self.cell.id.clone(),
            state: slot.state,
            pending_request: slot.parked.as_ref().map(|p| p.request_id),
            pending_action: slot.parked.as_ref().map(|p| p.action.clone()),
            trusted_actions: self.gate.trusted().list(),
            started_at: self.cell.started_at,
            updated_at: slot.updated_at,
            in_memory: true,
        }
    }
}
