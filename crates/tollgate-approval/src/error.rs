//! Errors raised by the approval ledger and the interrupt gate.

use tollgate_core::{RequestId, SessionId};
use tollgate_storage::StorageError;

/// Errors from approval ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A record already exists for this `(session, request)` pair.
    #[error("duplicate request {request_id} in session {session_id}")]
    DuplicateRequest {
        /// Session the request belongs to.
        session_id: SessionId,
        /// The reused request identifier.
        request_id: RequestId,
    },

    /// No record exists for this `(session, request)` pair.
    #[error("approval request {request_id} not found in session {session_id}")]
    NotFound {
        /// Session the request was looked up in.
        session_id: SessionId,
        /// The unknown request identifier.
        request_id: RequestId,
    },

    /// The request has already been approved or rejected.
    #[error("approval request {request_id} in session {session_id} is already {status}")]
    AlreadyResolved {
        /// Session the request belongs to.
        session_id: SessionId,
        /// The resolved request.
        request_id: RequestId,
        /// Status the request was found in.
        status: crate::record::ApprovalStatus,
    },

    /// The durable store failed.
    #[error("ledger storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored record could not be encoded or decoded.
    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors surfaced to the computation by [`InterruptGate::check`](crate::InterruptGate::check).
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Writing the pending record failed; the computation was not suspended.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The suspended computation was abandoned before a decision was delivered.
    #[error("suspension for request {request_id} was abandoned")]
    Abandoned {
        /// The request the computation was waiting on.
        request_id: RequestId,
    },

    /// The runner delivered a record that is still pending or belongs to another request.
    #[error("invalid decision delivered for request {request_id}: {reason}")]
    InvalidDecision {
        /// The request the computation was waiting on.
        request_id: RequestId,
        /// What was wrong with the delivered record.
        reason: String,
    },
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
