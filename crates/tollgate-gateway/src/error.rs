//! Error types for the gateway.

use thiserror::Error;

use tollgate_config::ConfigError;
use tollgate_runtime::RuntimeError;
use tollgate_storage::StorageError;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configured storage backend could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The orchestrator could not be assembled.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The RPC server could not bind its listen address.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The requested address.
        addr: String,
        /// Underlying failure.
        reason: String,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
