//! The resumable computation the runner drives.
//!
//! A [`TaskEngine`] is an opaque async computation. It receives a
//! [`TaskContext`] and must call [`TaskContext::check`] before every
//! sensitive step. When that call suspends, the engine's future is parked
//! in place: nothing it already did is re-run on resume.

pub mod plan;

use async_trait::async_trait;
use serde_json::Value;

use tollgate_approval::{GateError, GateOutcome, GateResult, InterruptGate};
use tollgate_core::SessionId;

pub use plan::{PlanEngine, PlanStep, RejectionPolicy};

/// Errors a computation may finish with.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The gate failed (ledger unavailable, suspension abandoned).
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The initial input could not be understood.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A gated step was rejected and the engine chose to abort.
    #[error("step '{action}' rejected: {reason}")]
    Rejected {
        /// The rejected action.
        action: String,
        /// The approver's reason.
        reason: String,
    },

    /// Any other unrecoverable failure.
    #[error("{0}")]
    Failed(String),
}

/// What a computation sees of its session.
#[derive(Debug, Clone)]
pub struct TaskContext {
    gate: InterruptGate,
}

impl TaskContext {
    /// Wrap a session's gate.
    #[must_use]
    pub fn new(gate: InterruptGate) -> Self {
        Self { gate }
    }

    /// The session this computation runs for.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.gate.session_id()
    }

    /// Pass an action through the session's interrupt gate.
    ///
    /// # Errors
    ///
    /// See [`InterruptGate::check`].
    pub async fn check(&self, action: &str, args: Value) -> GateResult<GateOutcome> {
        self.gate.check(action, args).await
    }
}

/// A resumable computation.
#[async_trait]
pub trait TaskEngine: Send + Sync {
    /// Run to completion, suspending at the gate as needed.
    async fn run(&self, input: Value, ctx: TaskContext) -> Result<Value, TaskError>;
}
