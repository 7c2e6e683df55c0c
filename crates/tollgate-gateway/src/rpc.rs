//! JSON-RPC API definition for daemon ↔ operator communication.
//!
//! Uses jsonrpsee proc macros to define the RPC interface. The daemon
//! implements the server side; `tollgated` client subcommands and tests use
//! the generated client.

use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::Value;

use tollgate_approval::ApprovalRecord;
use tollgate_core::{RequestId, SessionId};
use tollgate_runtime::{LivenessReport, ResumeReceipt, SessionStatus, StartReceipt, TaskOutcome};

/// The Tollgate daemon RPC API.
///
/// Decisions and resumption are separate calls: `approve`/`reject` only
/// write the ledger, and `resume` hands the recorded decision to the parked
/// computation.
#[rpc(server, client, namespace = "tollgate")]
pub trait TollgateRpc {
    /// Register a session and launch its computation in the background.
    #[method(name = "start")]
    async fn start(
        &self,
        input: Value,
        session_id: Option<SessionId>,
    ) -> Result<StartReceipt, ErrorObjectOwned>;

    /// Pending approval requests, oldest first.
    #[method(name = "listPending")]
    async fn list_pending(
        &self,
        session_id: Option<SessionId>,
    ) -> Result<Vec<ApprovalRecord>, ErrorObjectOwned>;

    /// Record an approval. `trust` skips future approvals of the same action
    /// for the rest of the session.
    #[method(name = "approve")]
    async fn approve(
        &self,
        session_id: SessionId,
        request_id: RequestId,
        decision: Option<Value>,
        approver: Option<String>,
        trust: Option<bool>,
    ) -> Result<ApprovalRecord, ErrorObjectOwned>;

    /// Record a rejection.
    #[method(name = "reject")]
    async fn reject(
        &self,
        session_id: SessionId,
        request_id: RequestId,
        reason: Option<String>,
        approver: Option<String>,
    ) -> Result<ApprovalRecord, ErrorObjectOwned>;

    /// Deliver the recorded decision to a suspended session.
    #[method(name = "resume")]
    async fn resume(&self, session_id: SessionId) -> Result<ResumeReceipt, ErrorObjectOwned>;

    /// Terminal outcome of a finished session.
    #[method(name = "result")]
    async fn result(&self, session_id: SessionId) -> Result<TaskOutcome, ErrorObjectOwned>;

    /// Current state of a session.
    #[method(name = "status")]
    async fn status(&self, session_id: SessionId) -> Result<SessionStatus, ErrorObjectOwned>;

    /// Busy/idle report with per-state counts.
    #[method(name = "liveness")]
    async fn liveness(&self) -> Result<LivenessReport, ErrorObjectOwned>;

    /// Forget a finished session.
    #[method(name = "cleanup")]
    async fn cleanup(&self, session_id: SessionId) -> Result<(), ErrorObjectOwned>;
}

/// Reason recorded when `reject` is called without one.
pub const DEFAULT_REJECT_REASON: &str = "User rejected";

/// Application-specific JSON-RPC error codes.
pub mod error_codes {
    /// Session not found.
    pub const SESSION_NOT_FOUND: i32 = -32001;
    /// Session already exists.
    pub const SESSION_ALREADY_EXISTS: i32 = -32002;
    /// Approval request not found.
    pub const REQUEST_NOT_FOUND: i32 = -32003;
    /// Internal daemon error (ledger unavailable).
    pub const INTERNAL_ERROR: i32 = -32004;
    /// Approval request identifier already in use.
    pub const DUPLICATE_REQUEST: i32 = -32006;
    /// Session is not waiting for approval.
    pub const NOT_SUSPENDED: i32 = -32007;
    /// No decision has been recorded yet.
    pub const DECISION_NOT_READY: i32 = -32008;
    /// Approval request was already decided.
    pub const ALREADY_RESOLVED: i32 = -32009;
    /// Session has not finished.
    pub const NOT_READY: i32 = -32010;
}
