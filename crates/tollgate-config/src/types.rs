//! Configuration types.
//!
//! These types have no dependencies on other tollgate crates; the daemon
//! converts them into domain types at startup. Every struct implements
//! [`Default`] so a bare `[section]` header in TOML yields a working
//! configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the Tollgate daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the approval ledger lives.
    pub storage: StorageSection,
    /// Which actions require approval.
    pub approval: ApprovalSection,
    /// Suspended-session housekeeping.
    pub sessions: SessionsSection,
    /// Reference engine behaviour.
    pub engine: EngineSection,
    /// JSON-RPC listener.
    pub gateway: GatewaySection,
    /// Logging level, format and directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// Key-value backend for the ledger and session journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map; nothing survives a restart.
    #[default]
    Memory,
    /// Embedded `SurrealKV` database on disk.
    Surrealkv,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Surrealkv => write!(f, "surrealkv"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend kind.
    pub backend: StorageBackend,
    /// Database directory. Required for `surrealkv`.
    pub path: Option<String>,
    /// Table name prefixing every ledger key.
    pub table_name: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            table_name: "hitl-approvals".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApprovalSection
// ---------------------------------------------------------------------------

/// Approval policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Action names that suspend the session for a human decision.
    pub sensitive_actions: Vec<String>,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            sensitive_actions: vec![
                "delete_files".to_owned(),
                "execute_command".to_owned(),
                "modify_database".to_owned(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// SessionsSection
// ---------------------------------------------------------------------------

/// Suspended-session housekeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Fail sessions suspended for longer than this. Unset waits forever.
    pub abandon_after_secs: Option<u64>,
    /// How often the reaper looks for abandoned sessions.
    pub reap_interval_secs: u64,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            abandon_after_secs: None,
            reap_interval_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineSection
// ---------------------------------------------------------------------------

/// Reference engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// `"skip"` or `"abort"`.
    pub rejection_policy: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            rejection_policy: "skip".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// GatewaySection
// ---------------------------------------------------------------------------

/// JSON-RPC listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Socket address to listen on.
    pub bind: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7420".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["tollgate_approval=debug"]`).
    pub directives: Vec<String>,
    /// Directory for rolling log files. Unset logs to stderr.
    pub directory: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            directory: None,
        }
    }
}
