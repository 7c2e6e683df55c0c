//! Tollgate Core - shared identifiers and state types.
//!
//! This crate provides:
//! - Session, request, and task identifiers
//! - A UTC timestamp wrapper used by every persisted record
//! - The per-session [`RunnerState`] machine states
//! - The [`Liveness`] signal reported to pollers

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod error;
pub mod state;
pub mod types;

pub use error::{IdError, IdResult};
pub use state::{Liveness, RunnerState};
pub use types::{RequestId, SessionId, TaskId, Timestamp};
