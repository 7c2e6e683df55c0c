//! RPC implementation for the daemon server.
//!
//! `RpcImpl` is a thin shell over the [`Orchestrator`]: every method
//! delegates, and every [`RuntimeError`] maps to one stable code.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use serde_json::Value;
use tracing::{debug, warn};

use tollgate_approval::ApprovalRecord;
use tollgate_core::{RequestId, SessionId};
use tollgate_runtime::{
    LivenessReport, Orchestrator, ResumeReceipt, RuntimeError, SessionStatus, StartReceipt,
    TaskOutcome,
};

use crate::rpc::{DEFAULT_REJECT_REASON, TollgateRpcServer, error_codes};

/// The jsonrpsee RPC method handler.
pub(super) struct RpcImpl {
    pub(super) orchestrator: Arc<Orchestrator>,
}

/// Map a runtime error onto its JSON-RPC error object.
fn to_rpc_error(err: &RuntimeError) -> ErrorObjectOwned {
    let code = match err {
        RuntimeError::DuplicateSession { .. } => error_codes::SESSION_ALREADY_EXISTS,
        RuntimeError::DuplicateRequest { .. } => error_codes::DUPLICATE_REQUEST,
        RuntimeError::SessionNotFound { .. } => error_codes::SESSION_NOT_FOUND,
        RuntimeError::RequestNotFound { .. } => error_codes::REQUEST_NOT_FOUND,
        RuntimeError::NotSuspended { .. } => error_codes::NOT_SUSPENDED,
        RuntimeError::DecisionNotReady { .. } => error_codes::DECISION_NOT_READY,
        RuntimeError::AlreadyResolved { .. } => error_codes::ALREADY_RESOLVED,
        RuntimeError::NotReady { .. } => error_codes::NOT_READY,
        RuntimeError::Ledger(_) => {
            warn!(error = %err, "Ledger failure surfaced to RPC caller");
            error_codes::INTERNAL_ERROR
        },
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

fn rpc_result<T>(result: Result<T, RuntimeError>) -> Result<T, ErrorObjectOwned> {
    result.map_err(|e| to_rpc_error(&e))
}

#[jsonrpsee::core::async_trait]
impl TollgateRpcServer for RpcImpl {
    async fn start(
        &self,
        input: Value,
        session_id: Option<SessionId>,
    ) -> Result<StartReceipt, ErrorObjectOwned> {
        rpc_result(self.orchestrator.start(session_id, input).await)
    }

    async fn list_pending(
        &self,
        session_id: Option<SessionId>,
    ) -> Result<Vec<ApprovalRecord>, ErrorObjectOwned> {
        rpc_result(self.orchestrator.list_pending(session_id.as_ref()).await)
    }

    async fn approve(
        &self,
        session_id: SessionId,
        request_id: RequestId,
        decision: Option<Value>,
        approver: Option<String>,
        trust: Option<bool>,
    ) -> Result<ApprovalRecord, ErrorObjectOwned> {
        debug!(session_id = %session_id, request_id = %request_id, "approve via RPC");
        rpc_result(
            self.orchestrator
                .approve(
                    &session_id,
                    request_id,
                    decision.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
                    approver,
                    trust.unwrap_or(false),
                )
                .await,
        )
    }

    async fn reject(
        &self,
        session_id: SessionId,
        request_id: RequestId,
        reason: Option<String>,
        approver: Option<String>,
    ) -> Result<ApprovalRecord, ErrorObjectOwned> {
        debug!(session_id = %session_id, request_id = %request_id, "reject via RPC");
        let reason = reason.unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
        rpc_result(
            self.orchestrator
                .reject(&session_id, request_id, reason, approver)
                .await,
        )
    }

    async fn resume(&self, session_id: SessionId) -> Result<ResumeReceipt, ErrorObjectOwned> {
        rpc_result(self.orchestrator.resume(&session_id).await)
    }

    async fn result(&self, session_id: SessionId) -> Result<TaskOutcome, ErrorObjectOwned> {
        rpc_result(self.orchestrator.result(&session_id).await)
    }

    async fn status(&self, session_id: SessionId) -> Result<SessionStatus, ErrorObjectOwned> {
        rpc_result(self.orchestrator.status(&session_id).await)
    }

    async fn liveness(&self) -> Result<LivenessReport, ErrorObjectOwned> {
        Ok(self.orchestrator.liveness())
    }

    async fn cleanup(&self, session_id: SessionId) -> Result<(), ErrorObjectOwned> {
        rpc_result(self.orchestrator.cleanup(&session_id).await)
    }
}
