//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{IdError, IdResult};

// Identifiers
pub use crate::{RequestId, SessionId, TaskId, Timestamp};

// States
pub use crate::{Liveness, RunnerState};
