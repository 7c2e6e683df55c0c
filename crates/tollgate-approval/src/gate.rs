//! Interrupt gate: the choke point a computation passes through before any
//! sensitive action.
//!
//! # Gate Flow
//!
//! 1. Action not classified as sensitive -> [`GateOutcome::Proceed`], no ledger I/O
//! 2. Action trusted earlier in this session -> [`GateOutcome::Proceed`]
//! 3. Otherwise record a pending request in the [`ApprovalLedger`]
//! 4. Park the computation at the [`SuspensionPoint`] until the runner
//!    delivers the resolved record
//! 5. Apply trust if the approval asked for it, return [`GateOutcome::Decision`]
//!
//! Sensitive checks within one session are serialized, so at most one
//! request per session is pending at any time. If step 3 fails the
//! computation is never suspended and receives [`GateError::Ledger`]. If
//! step 4 fails the request is rejected on behalf of [`GATE_APPROVER`], so
//! no pending record outlives the computation that wrote it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tollgate_core::{RequestId, SessionId};

use crate::classifier::ActionClassifier;
use crate::error::{GateError, GateResult, LedgerError};
use crate::ledger::ApprovalLedger;
use crate::record::{ApprovalReason, ApprovalRecord, Resolution, Verdict};
use crate::trust::TrustedActions;

/// Approver recorded when the gate retires a request its session could not
/// wait for.
pub const GATE_APPROVER: &str = "system:gate";

/// Where a gated computation waits for its decision.
///
/// The task runner implements this: it marks the session as suspended,
/// parks the caller, and wakes it with the resolved record on `resume`.
#[async_trait]
pub trait SuspensionPoint: Send + Sync {
    /// Park until `pending` has been resolved and resumed.
    ///
    /// Returns the resolved record for exactly this request.
    async fn suspend(&self, pending: &ApprovalRecord) -> GateResult<ApprovalRecord>;
}

/// A recorded human decision handed back to the computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The request the decision answers.
    pub request_id: RequestId,
    /// Approve or reject.
    pub verdict: Verdict,
    /// Opaque payload supplied by the approver.
    pub payload: Value,
    /// Who decided.
    pub approver: Option<String>,
    /// Whether the action is now trusted for the session.
    pub trusted: bool,
}

impl Decision {
    /// Whether the action may go ahead.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approved
    }

    /// The rejection reason, if the payload carries one.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        match self.verdict {
            Verdict::Rejected => self.payload.get("reason").and_then(Value::as_str),
            Verdict::Approved => None,
        }
    }
}

/// Result of [`InterruptGate::check`].
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// No approval needed.
    Proceed,
    /// A human decided; the computation chooses what to do with a rejection.
    Decision(Decision),
}

impl GateOutcome {
    /// Whether the gated action may run.
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        match self {
            Self::Proceed => true,
            Self::Decision(d) => d.is_approved(),
        }
    }
}

/// Per-session interrupt gate.
#[derive(Clone)]
pub struct InterruptGate {
    session_id: SessionId,
    classifier: Arc<ActionClassifier>,
    ledger: ApprovalLedger,
    trusted: Arc<TrustedActions>,
    suspender: Arc<dyn SuspensionPoint>,
    /// Serializes sensitive checks so a session never has two requests pending.
    turn: Arc<Mutex<()>>,
}

impl std::fmt::Debug for InterruptGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptGate")
            .field("session_id", &self.session_id)
            .field("trusted", &self.trusted.list())
            .finish_non_exhaustive()
    }
}

impl InterruptGate {
    /// Create a gate for one session with a fresh trust list.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        classifier: Arc<ActionClassifier>,
        ledger: ApprovalLedger,
        suspender: Arc<dyn SuspensionPoint>,
    ) -> Self {
        Self {
            session_id,
            classifier,
            ledger,
            trusted: Arc::new(TrustedActions::new()),
            suspender,
            turn: Arc::new(Mutex::new(())),
        }
    }

    /// The session this gate guards.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The session's trust list.
    #[must_use]
    pub fn trusted(&self) -> &TrustedActions {
        &self.trusted
    }

    /// Check an action before running it, suspending for approval if needed.
    ///
    /// # Errors
    ///
    /// - [`GateError::Ledger`] if the pending record could not be written.
    /// - [`GateError::Abandoned`] if the suspension was torn down.
    /// - [`GateError::InvalidDecision`] if the runner woke the gate with
    ///   the wrong record.
    pub async fn check(&self, action: &str, args: Value) -> GateResult<GateOutcome> {
        if !self.classifier.requires_approval(action) {
            return Ok(GateOutcome::Proceed);
        }
        if self.trusted.is_trusted(action) {
            debug!(session_id = %self.session_id, action, "Action is trusted, skipping approval");
            return Ok(GateOutcome::Proceed);
        }

        let _turn = self.turn.lock().await;
        // A concurrent check may have earned trust while we queued.
        if self.trusted.is_trusted(action) {
            return Ok(GateOutcome::Proceed);
        }

        let request_id = RequestId::new();
        let pending = self
            .ledger
            .put_pending(
                &self.session_id,
                request_id,
                ApprovalReason::for_action(action, args),
            )
            .await?;

        let resolved = match self.suspender.suspend(&pending).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.retire(request_id, &e).await;
                return Err(e);
            },
        };

        if resolved.request_id != request_id {
            return Err(GateError::InvalidDecision {
                request_id,
                reason: format!("woken with request {}", resolved.request_id),
            });
        }
        let Some(verdict) = resolved.verdict() else {
            return Err(GateError::InvalidDecision {
                request_id,
                reason: "request is still pending".into(),
            });
        };

        let trusted = verdict == Verdict::Approved && resolved.trusted;
        if trusted && self.trusted.trust(action) {
            info!(session_id = %self.session_id, action, "Action is now trusted for the session");
        }

        Ok(GateOutcome::Decision(Decision {
            request_id,
            verdict,
            payload: resolved.decision.unwrap_or(Value::Null),
            approver: resolved.approver,
            trusted,
        }))
    }

    /// Reject a request whose suspension failed. A request already decided
    /// (for instance by the idle reaper) is left as it is.
    async fn retire(&self, request_id: RequestId, cause: &GateError) {
        let resolution = Resolution::reject(format!("not awaited: {cause}")).by(GATE_APPROVER);
        match self
            .ledger
            .resolve(&self.session_id, request_id, resolution)
            .await
        {
            Ok(_) => {
                debug!(session_id = %self.session_id, request_id = %request_id, "Retired unawaited request");
            },
            Err(LedgerError::AlreadyResolved { .. }) => {},
            Err(e) => {
                warn!(session_id = %self.session_id, request_id = %request_id, "Failed to retire unawaited request: {e}");
            },
        }
    }
}
