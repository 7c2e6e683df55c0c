//! Task runner: owns one background computation per session.
//!
//! # Session lifecycle
//!
//! ```text
//!            start
//!              │
//!              ▼
//!          running ──── gate suspends ────▶ suspended_pending_approval
//!           │   ▲                                   │
//!           │   └──────── resume (decided) ─────────┘
//!           ▼
//!   completed | failed
//! ```
//!
//! Every transition happens under the session's own lock. Ledger writes are
//! made by the gate and by `approve`/`reject`; `resume` only reads the
//! ledger, so a decision is always durable before a computation observes it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use tollgate_approval::{
    ActionClassifier, ApprovalLedger, ApprovalRecord, DEFAULT_APPROVER, InterruptGate,
    LedgerError, Resolution, SuspensionPoint, Verdict,
};
use tollgate_core::{RequestId, RunnerState, SessionId, TaskId, Timestamp};
use tollgate_storage::{KvStore, ScopedKvStore};

use crate::engine::{PlanEngine, TaskContext, TaskEngine};
use crate::error::{RuntimeError, RuntimeResult};
use crate::journal::SessionJournal;
use crate::liveness::{LivenessReport, LivenessReporter};
use crate::registry::SessionRegistry;
use crate::session::{SessionCell, SessionHandle, SessionStatus, TaskOutcome};

/// Approver recorded when an idle session is abandoned.
pub const REAPER_APPROVER: &str = "system:reaper";

/// Returned by [`Orchestrator::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReceipt {
    /// The new session.
    pub session_id: SessionId,
    /// Handle of the background task.
    pub task_id: TaskId,
    /// When the session started.
    pub started_at: Timestamp,
}

/// Returned by [`Orchestrator::resume`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReceipt {
    /// The resumed session.
    pub session_id: SessionId,
    /// The request whose decision was delivered.
    pub request_id: RequestId,
    /// The delivered verdict.
    pub verdict: Verdict,
}

/// Builder for [`Orchestrator`].
#[must_use]
pub struct OrchestratorBuilder {
    store: Arc<dyn KvStore>,
    table: String,
    classifier: ActionClassifier,
    engine: Arc<dyn TaskEngine>,
    journal: bool,
}

impl OrchestratorBuilder {
    /// Table name prefixing every ledger and journal key.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Which actions require approval.
    pub fn classifier(mut self, classifier: ActionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// The computation to run for each session.
    pub fn engine(mut self, engine: Arc<dyn TaskEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Whether to journal session snapshots (default on).
    pub fn journal(mut self, enabled: bool) -> Self {
        self.journal = enabled;
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Ledger`] if the table name is not a valid
    /// storage namespace.
    pub fn build(self) -> RuntimeResult<Orchestrator> {
        let journal = if self.journal {
            let scoped = ScopedKvStore::new(Arc::clone(&self.store), format!("{}:sessions", self.table))
                .map_err(|e| RuntimeError::Ledger(e.to_string()))?;
            SessionJournal::new(scoped)
        } else {
            SessionJournal::disabled()
        };
        Ok(Orchestrator {
            ledger: ApprovalLedger::new(self.store, self.table),
            classifier: Arc::new(self.classifier),
            engine: self.engine,
            registry: SessionRegistry::new(),
            liveness: Arc::new(LivenessReporter::new()),
            journal,
        })
    }
}

/// The human-in-the-loop approval orchestrator.
pub struct Orchestrator {
    ledger: ApprovalLedger,
    classifier: Arc<ActionClassifier>,
    engine: Arc<dyn TaskEngine>,
    registry: SessionRegistry,
    liveness: Arc<LivenessReporter>,
    journal: SessionJournal,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ledger", &self.ledger)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start building an orchestrator over `store`.
    ///
    /// Defaults: table `hitl-approvals`, the default sensitive actions, and
    /// the reference [`PlanEngine`].
    pub fn builder(store: Arc<dyn KvStore>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            table: tollgate_approval::DEFAULT_TABLE_NAME.to_string(),
            classifier: ActionClassifier::default(),
            engine: Arc::new(PlanEngine::default()),
            journal: true,
        }
    }

    /// The approval ledger.
    #[must_use]
    pub fn ledger(&self) -> &ApprovalLedger {
        &self.ledger
    }

    /// The liveness reporter.
    #[must_use]
    pub fn liveness_reporter(&self) -> &Arc<LivenessReporter> {
        &self.liveness
    }

    /// The session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Register a session and launch its computation in the background.
    ///
    /// A fresh session ID is generated when `session_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateSession`] if the ID is registered.
    pub async fn start(
        &self,
        session_id: Option<SessionId>,
        input: Value,
    ) -> RuntimeResult<StartReceipt> {
        let session_id = session_id.unwrap_or_default();
        let cell = Arc::new(SessionCell::new(
            session_id.clone(),
            input.clone(),
            Arc::clone(&self.liveness),
            self.journal.clone(),
        ));
        let gate = InterruptGate::new(
            session_id.clone(),
            Arc::clone(&self.classifier),
            self.ledger.clone(),
            Arc::clone(&cell) as Arc<dyn SuspensionPoint>,
        );
        let handle = Arc::new(SessionHandle::new(Arc::clone(&cell), gate));

        self.registry.insert(Arc::clone(&handle)).await?;
        {
            let slot = cell.lock().await;
            self.liveness.transition(None, slot.state);
            self.journal.record(&cell.snapshot(&slot)).await;
        }

        let receipt = StartReceipt {
            session_id: session_id.clone(),
            task_id: cell.task_id(),
            started_at: cell.started_at(),
        };
        info!(session_id = %session_id, task_id = %receipt.task_id, "Session started");

        tokio::spawn(supervise(handle, Arc::clone(&self.engine), input));
        Ok(receipt)
    }

    /// Pending approval requests, oldest first, optionally for one session.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Ledger`] if the ledger cannot be read.
    pub async fn list_pending(
        &self,
        session_filter: Option<&SessionId>,
    ) -> RuntimeResult<Vec<ApprovalRecord>> {
        Ok(self.ledger.list_pending(session_filter).await?)
    }

    /// Record an approval. The session is resumed separately.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::RequestNotFound`] if no such request exists.
    /// - [`RuntimeError::AlreadyResolved`] if it was already decided.
    pub async fn approve(
        &self,
        session_id: &SessionId,
        request_id: RequestId,
        payload: Value,
        approver: Option<String>,
        trust: bool,
    ) -> RuntimeResult<ApprovalRecord> {
        let resolution = Resolution::approve(payload)
            .by(approver.unwrap_or_else(|| DEFAULT_APPROVER.to_string()))
            .trusted(trust);
        Ok(self.ledger.resolve(session_id, request_id, resolution).await?)
    }

    /// Record a rejection. The session is resumed separately.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::RequestNotFound`] if no such request exists.
    /// - [`RuntimeError::AlreadyResolved`] if it was already decided.
    pub async fn reject(
        &self,
        session_id: &SessionId,
        request_id: RequestId,
        reason: impl Into<String>,
        approver: Option<String>,
    ) -> RuntimeResult<ApprovalRecord> {
        let resolution = Resolution::reject(reason)
            .by(approver.unwrap_or_else(|| DEFAULT_APPROVER.to_string()));
        Ok(self.ledger.resolve(session_id, request_id, resolution).await?)
    }

    /// Deliver the recorded decision to a suspended session.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::SessionNotFound`] if the session is unknown.
    /// - [`RuntimeError::NotSuspended`] if it is not awaiting approval.
    /// - [`RuntimeError::DecisionNotReady`] if the request is still pending;
    ///   the session stays suspended.
    /// - [`RuntimeError::Ledger`] if the ledger cannot be read; the session
    ///   stays suspended and `resume` may be retried.
    pub async fn resume(&self, session_id: &SessionId) -> RuntimeResult<ResumeReceipt> {
        let handle = self.registry.require(session_id).await?;
        let cell = handle.cell();
        let mut slot = cell.lock().await;

        let request_id = match (&slot.state, &slot.parked) {
            (RunnerState::SuspendedPendingApproval, Some(parked)) => parked.request_id,
            (state, _) => {
                return Err(RuntimeError::NotSuspended {
                    session_id: session_id.clone(),
                    state: *state,
                });
            },
        };

        let record = self.ledger.get(session_id, request_id).await?;
        let Some(verdict) = record.verdict() else {
            return Err(RuntimeError::DecisionNotReady {
                session_id: session_id.clone(),
                request_id,
            });
        };

        let Some(parked) = slot.parked.take() else {
            return Err(RuntimeError::NotSuspended {
                session_id: session_id.clone(),
                state: slot.state,
            });
        };
        cell.transition(&mut slot, RunnerState::Running).await;

        if parked.wake.send(record).is_err() {
            // The computation is gone; there is nothing left to resume.
            error!(session_id = %session_id, request_id = %request_id, "Suspended computation vanished before resume");
            slot.outcome = Some(TaskOutcome::failed("computation exited while suspended"));
            cell.transition(&mut slot, RunnerState::Failed).await;
        } else {
            info!(session_id = %session_id, request_id = %request_id, verdict = %verdict, "Session resumed");
        }

        Ok(ResumeReceipt {
            session_id: session_id.clone(),
            request_id,
            verdict,
        })
    }

    /// The stored outcome of a finished session.
    ///
    /// Sessions no longer registered are answered from the journal.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::NotReady`] while the session is running or suspended.
    /// - [`RuntimeError::SessionNotFound`] if nothing is known about it.
    pub async fn result(&self, session_id: &SessionId) -> RuntimeResult<TaskOutcome> {
        if let Some(handle) = self.registry.get(session_id).await {
            let slot = handle.cell().lock().await;
            return slot.outcome.clone().ok_or(RuntimeError::NotReady {
                session_id: session_id.clone(),
                state: slot.state,
            });
        }

        match self.journal.load(session_id).await? {
            Some(snapshot) => snapshot.outcome.ok_or(RuntimeError::NotReady {
                session_id: session_id.clone(),
                state: snapshot.state,
            }),
            None => Err(RuntimeError::SessionNotFound {
                session_id: session_id.clone(),
            }),
        }
    }

    /// Current status of a session, falling back to the journal.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionNotFound`] if nothing is known about it.
    pub async fn status(&self, session_id: &SessionId) -> RuntimeResult<SessionStatus> {
        if let Some(handle) = self.registry.get(session_id).await {
            return Ok(handle.status().await);
        }
        self.journal
            .load(session_id)
            .await?
            .map(SessionStatus::from_snapshot)
            .ok_or_else(|| RuntimeError::SessionNotFound {
                session_id: session_id.clone(),
            })
    }

    /// Busy if any session is running.
    #[must_use]
    pub fn liveness(&self) -> LivenessReport {
        self.liveness.report()
    }

    /// Drop a finished session from the registry.
    ///
    /// Its ledger history and journal snapshot are kept.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::SessionNotFound`] if the session is not registered.
    /// - [`RuntimeError::NotReady`] if it has not finished.
    pub async fn cleanup(&self, session_id: &SessionId) -> RuntimeResult<()> {
        let handle = self.registry.require(session_id).await?;
        let state = handle.cell().state().await;
        if !state.is_terminal() {
            return Err(RuntimeError::NotReady {
                session_id: session_id.clone(),
                state,
            });
        }
        if self.registry.remove(session_id).await.is_some() {
            self.liveness.forget(state);
            info!(session_id = %session_id, "Session cleaned up");
        }
        Ok(())
    }

    /// Fail every session that has been suspended for at least `older_than`.
    ///
    /// Each expired session's pending request is first rejected on behalf of
    /// [`REAPER_APPROVER`]; only then is the session failed and its
    /// computation woken with
    /// [`GateError::Abandoned`](tollgate_approval::GateError::Abandoned).
    /// A session whose request was decided in the meantime is left suspended
    /// for `resume`, and one whose rejection could not be written is retried
    /// on the next sweep. Returns the abandoned session IDs.
    pub async fn abandon_idle(&self, older_than: Duration) -> Vec<SessionId> {
        let mut abandoned = Vec::new();
        for handle in self.registry.handles().await {
            let cell = handle.cell();
            let mut slot = cell.lock().await;
            if slot.state != RunnerState::SuspendedPendingApproval {
                continue;
            }
            let Some(request_id) = slot
                .parked
                .as_ref()
                .filter(|p| p.since.elapsed() >= older_than)
                .map(|p| p.request_id)
            else {
                continue;
            };

            let reason = format!("abandoned: no decision within {}s", older_than.as_secs());
            let resolution = Resolution::reject(reason.clone()).by(REAPER_APPROVER);
            match self.ledger.resolve(cell.id(), request_id, resolution).await {
                Ok(_) => {},
                Err(LedgerError::AlreadyResolved { .. }) => {
                    debug!(session_id = %cell.id(), request_id = %request_id, "Idle request already decided, leaving session suspended");
                    continue;
                },
                Err(e) => {
                    warn!(session_id = %cell.id(), request_id = %request_id, "Failed to reject idle request, will retry: {e}");
                    continue;
                },
            }

            // Dropping the sender wakes the computation with `Abandoned`.
            let parked = slot.parked.take();
            slot.outcome = Some(TaskOutcome::failed(reason));
            cell.transition(&mut slot, RunnerState::Failed).await;
            drop(slot);
            drop(parked);

            handle.gate().trusted().clear();
            warn!(session_id = %cell.id(), "Session abandoned after {}s suspended", older_than.as_secs());
            abandoned.push(cell.id().clone());
        }
        abandoned
    }
}

/// Drive one session's computation to a terminal state.
///
/// The computation runs in its own task so that a panic is caught by the
/// join handle and recorded as a failure instead of tearing down the
/// orchestrator.
async fn supervise(handle: Arc<SessionHandle>, engine: Arc<dyn TaskEngine>, input: Value) {
    let cell = Arc::clone(handle.cell());
    let ctx = TaskContext::new(handle.gate().clone());
    let span = info_span!("session", session_id = %cell.id(), task_id = %cell.task_id());

    let computation = tokio::spawn(async move { engine.run(input, ctx).await }.instrument(span));

    let outcome = match computation.await {
        Ok(Ok(result)) => TaskOutcome::completed(result),
        Ok(Err(e)) => TaskOutcome::failed(e.to_string()),
        Err(e) if e.is_panic() => TaskOutcome::failed("computation panicked"),
        Err(e) => TaskOutcome::failed(format!("computation cancelled: {e}")),
    };

    cell.finish(outcome).await;
    handle.gate().trusted().clear();
}
