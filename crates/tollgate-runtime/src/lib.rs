//! Tollgate Runtime - drives resumable computations through the approval gate.
//!
//! The [`Orchestrator`] owns one background task per session. Each task runs
//! a [`TaskEngine`] that checks sensitive actions through its session's
//! [`InterruptGate`](tollgate_approval::InterruptGate). When the gate
//! suspends, the task parks in place until a human decision has been
//! written to the ledger and [`Orchestrator::resume`] delivers it.
//!
//! Sessions live in the in-memory [`SessionRegistry`]; every state
//! transition is reported to the [`LivenessReporter`] so that busy/idle
//! probes never wait on a session.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod engine;
pub mod error;
pub mod journal;
pub mod liveness;
pub mod registry;
pub mod runner;
pub mod session;

pub use engine::{PlanEngine, PlanStep, RejectionPolicy, TaskContext, TaskEngine, TaskError};
pub use error::{RuntimeError, RuntimeResult};
pub use journal::{SessionJournal, SessionSnapshot};
pub use liveness::{LivenessReport, LivenessReporter, StateCounts};
pub use registry::SessionRegistry;
pub use runner::{
    Orchestrator, OrchestratorBuilder, REAPER_APPROVER, ResumeReceipt, StartReceipt,
};
pub use session::{SessionCell, SessionHandle, SessionStatus, TaskOutcome};
