//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_approval::prelude::*;` to import all essential types.

// Errors
pub use crate::{GateError, GateResult, LedgerError, LedgerResult};

// Ledger
pub use crate::{ApprovalLedger, ApprovalReason, ApprovalRecord, ApprovalStatus, Resolution, Verdict};

// Gate
pub use crate::{
    ActionClassifier, Decision, GATE_APPROVER, GateOutcome, InterruptGate, SuspensionPoint,
};
