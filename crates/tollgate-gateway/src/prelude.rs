//! Convenience re-exports for daemon embedders.
//!
//! ```rust,ignore
//! use tollgate_gateway::prelude::*;
//! ```

pub use crate::{GatewayError, GatewayResult};

pub use crate::TollgateServer;
pub use crate::rpc::{TollgateRpcClient, error_codes};
