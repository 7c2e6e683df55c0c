//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{RuntimeError, RuntimeResult, TaskError};

// Runner
pub use crate::{Orchestrator, OrchestratorBuilder, ResumeReceipt, StartReceipt};

// Sessions
pub use crate::{LivenessReport, SessionStatus, TaskOutcome};

// Engines
pub use crate::{PlanEngine, RejectionPolicy, TaskContext, TaskEngine};
