//! Persisted approval records and the resolutions applied to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use tollgate_core::{RequestId, SessionId, Timestamp};

/// Lifecycle status of an approval request.
///
/// Transitions only `Pending -> Approved` or `Pending -> Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a human decision.
    Pending,
    /// A human signed off on the action.
    Approved,
    /// A human declined the action.
    Rejected,
}

impl ApprovalStatus {
    /// Storage label, also used in index namespaces.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether a decision has been recorded.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict carried by a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Proceed with the action.
    Approved,
    /// Do not perform the action.
    Rejected,
}

impl From<Verdict> for ApprovalStatus {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Approved => Self::Approved,
            Verdict::Rejected => Self::Rejected,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ApprovalStatus::from(*self).fmt(f)
    }
}

/// What is being approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalReason {
    /// Name of the sensitive action.
    pub action: String,
    /// Arguments the action would run with.
    pub args: Value,
    /// Human-readable prompt.
    pub message: String,
}

impl ApprovalReason {
    /// Build the standard reason for a gated action.
    #[must_use]
    pub fn for_action(action: impl Into<String>, args: Value) -> Self {
        let action = action.into();
        let message = format!("Action '{action}' requires human approval before execution");
        Self {
            action,
            args,
            message,
        }
    }
}

/// One pending or resolved request for sign-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Owning session (partition key).
    pub session_id: SessionId,
    /// Request identifier (sort key, unique within the session).
    pub request_id: RequestId,
    /// Current status.
    pub status: ApprovalStatus,
    /// What is being approved.
    pub reason: ApprovalReason,
    /// Decision payload recorded on resolve.
    pub decision: Option<Value>,
    /// Who resolved the request.
    pub approver: Option<String>,
    /// Whether the approval marked the action as trusted for the session.
    #[serde(default)]
    pub trusted: bool,
    /// When the request was created.
    pub created_at: Timestamp,
    /// When the request was resolved.
    pub resolved_at: Option<Timestamp>,
}

impl ApprovalRecord {
    /// Create a fresh pending record.
    #[must_use]
    pub fn pending(session_id: SessionId, request_id: RequestId, reason: ApprovalReason) -> Self {
        Self {
            session_id,
            request_id,
            status: ApprovalStatus::Pending,
            reason,
            decision: None,
            approver: None,
            trusted: false,
            created_at: Timestamp::now(),
            resolved_at: None,
        }
    }

    /// The verdict, once resolved.
    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        match self.status {
            ApprovalStatus::Pending => None,
            ApprovalStatus::Approved => Some(Verdict::Approved),
            ApprovalStatus::Rejected => Some(Verdict::Rejected),
        }
    }
}

/// A decision to apply to a pending record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Approve or reject.
    pub verdict: Verdict,
    /// Opaque payload handed to the computation.
    pub payload: Value,
    /// Who made the decision.
    pub approver: String,
    /// Trust this action for the rest of the session. Ignored on reject.
    pub trusted: bool,
}

/// Approver recorded when the caller does not name one.
pub const DEFAULT_APPROVER: &str = "cli";

impl Resolution {
    /// Approve with the given payload.
    #[must_use]
    pub fn approve(payload: Value) -> Self {
        Self {
            verdict: Verdict::Approved,
            payload,
            approver: DEFAULT_APPROVER.to_string(),
            trusted: false,
        }
    }

    /// Reject, recording `{"reason": reason}` as the payload.
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Rejected,
            payload: serde_json::json!({ "reason": reason.into() }),
            approver: DEFAULT_APPROVER.to_string(),
            trusted: false,
        }
    }

    /// Set who made the decision.
    #[must_use]
    pub fn by(mut self, approver: impl Into<String>) -> Self {
        self.approver = approver.into();
        self
    }

    /// Mark the action as trusted for the remainder of the session.
    #[must_use]
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted && self.verdict == Verdict::Approved;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_payload_carries_reason() {
        let r = Resolution::reject("not allowed");
        assert_eq!(r.verdict, Verdict::Rejected);
        assert_eq!(r.payload["reason"], "not allowed");
        assert_eq!(r.approver, DEFAULT_APPROVER);
    }

    #[test]
    fn test_trust_is_dropped_on_reject() {
        let r = Resolution::reject("no").trusted(true);
        assert!(!r.trusted);
        let a = Resolution::approve(Value::from("y")).trusted(true).by("alice");
        assert!(a.trusted);
        assert_eq!(a.approver, "alice");
    }

    #[test]
    fn test_pending_record_has_no_verdict() {
        let rec = ApprovalRecord::pending(
            SessionId::new(),
            RequestId::new(),
            ApprovalReason::for_action("delete_files", serde_json::json!({"paths": ["/tmp/x"]})),
        );
        assert_eq!(rec.status, ApprovalStatus::Pending);
        assert!(rec.verdict().is_none());
        assert!(rec.reason.message.contains("delete_files"));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&ApprovalStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
    }
}
