//! Runtime error types.

use thiserror::Error;

use tollgate_approval::LedgerError;
use tollgate_core::{RequestId, RunnerState, SessionId};

/// Errors returned synchronously by orchestrator commands.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A session with this identifier is already registered.
    #[error("Session already exists: {session_id}")]
    DuplicateSession {
        /// The session ID.
        session_id: SessionId,
    },

    /// An approval request with this identifier already exists.
    #[error("Duplicate approval request {request_id} in session {session_id}")]
    DuplicateRequest {
        /// The session ID.
        session_id: SessionId,
        /// The request ID.
        request_id: RequestId,
    },

    /// No such session is known.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The session ID.
        session_id: SessionId,
    },

    /// No such approval request is known.
    #[error("Approval request {request_id} not found in session {session_id}")]
    RequestNotFound {
        /// The session ID.
        session_id: SessionId,
        /// The request ID.
        request_id: RequestId,
    },

    /// `resume` was called on a session that is not awaiting approval.
    #[error("Session {session_id} is not waiting for approval: {state}")]
    NotSuspended {
        /// The session ID.
        session_id: SessionId,
        /// The state the session was found in.
        state: RunnerState,
    },

    /// `resume` was called before a decision was recorded.
    #[error("No decision recorded yet for request {request_id} in session {session_id}")]
    DecisionNotReady {
        /// The session ID.
        session_id: SessionId,
        /// The request still pending.
        request_id: RequestId,
    },

    /// The approval request has already been decided.
    #[error("Approval request {request_id} in session {session_id} is already {status}")]
    AlreadyResolved {
        /// The session ID.
        session_id: SessionId,
        /// The request ID.
        request_id: RequestId,
        /// The status it was found in.
        status: String,
    },

    /// The session has not reached a terminal state.
    #[error("Session {session_id} has not finished: {state}")]
    NotReady {
        /// The session ID.
        session_id: SessionId,
        /// The current state.
        state: RunnerState,
    },

    /// The durable ledger failed; the command had no effect on session state.
    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl RuntimeError {
    /// Whether this error reports an unknown session or request.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound { .. } | Self::RequestNotFound { .. }
        )
    }
}

impl From<LedgerError> for RuntimeError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DuplicateRequest {
                session_id,
                request_id,
            } => Self::DuplicateRequest {
                session_id,
                request_id,
            },
            LedgerError::NotFound {
                session_id,
                request_id,
            } => Self::RequestNotFound {
                session_id,
                request_id,
            },
            LedgerError::AlreadyResolved {
                session_id,
                request_id,
                status,
            } => Self::AlreadyResolved {
                session_id,
                request_id,
                status: status.to_string(),
            },
            other @ (LedgerError::Storage(_) | LedgerError::Serialization(_)) => {
                Self::Ledger(other.to_string())
            },
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
