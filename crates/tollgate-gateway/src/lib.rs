//! Tollgate Gateway - the JSON-RPC daemon around the approval orchestrator.
//!
//! [`TollgateServer`] turns a loaded [`tollgate_config::Config`] into a
//! running [`tollgate_runtime::Orchestrator`], serves it over jsonrpsee
//! (namespace `tollgate`) and optionally runs the idle reaper that abandons
//! sessions left waiting for a decision. The `tollgated` binary wraps this
//! crate as both daemon and operator client.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod rpc;
pub mod server;

pub use error::{GatewayError, GatewayResult};
pub use rpc::{DEFAULT_REJECT_REASON, TollgateRpcClient, TollgateRpcServer, error_codes};
pub use server::TollgateServer;
