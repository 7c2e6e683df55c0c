//! Tollgate Approval - the durable approval ledger and the interrupt gate.
//!
//! A computation calls [`InterruptGate::check`] before every sensitive
//! action. Safe actions pass straight through; sensitive ones are written to
//! the [`ApprovalLedger`] as pending and the computation parks at a
//! [`SuspensionPoint`] until a human decision is delivered.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use tollgate_approval::{ApprovalLedger, ApprovalReason, ApprovalStatus, Resolution};
//! use tollgate_core::{RequestId, SessionId};
//! use tollgate_storage::MemoryKvStore;
//!
//! # tokio_test_block_on(async {
//! let ledger = ApprovalLedger::new(Arc::new(MemoryKvStore::new()), "hitl-approvals");
//! let session = SessionId::new();
//! let request = RequestId::new();
//!
//! ledger
//!     .put_pending(&session, request, ApprovalReason::for_action("delete_files", json!({})))
//!     .await?;
//! let record = ledger
//!     .resolve(&session, request, Resolution::reject("not allowed"))
//!     .await?;
//! assert_eq!(record.status, ApprovalStatus::Rejected);
//! # Ok::<(), tollgate_approval::LedgerError>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod classifier;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod record;
pub mod trust;

pub use classifier::{ActionClassifier, DEFAULT_SENSITIVE_ACTIONS};
pub use error::{GateError, GateResult, LedgerError, LedgerResult};
pub use gate::{Decision, GATE_APPROVER, GateOutcome, InterruptGate, SuspensionPoint};
pub use ledger::{ApprovalLedger, DEFAULT_TABLE_NAME};
pub use record::{
    ApprovalReason, ApprovalRecord, ApprovalStatus, DEFAULT_APPROVER, Resolution, Verdict,
};
pub use trust::TrustedActions;
