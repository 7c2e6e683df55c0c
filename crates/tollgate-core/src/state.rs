//! Session runner states and the liveness signal derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one session's background computation.
///
/// `Running` is initial; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    /// The computation is actively executing.
    Running,
    /// The computation is parked at the interrupt gate awaiting a decision.
    SuspendedPendingApproval,
    /// The computation finished and its result is stored.
    Completed,
    /// The computation raised an unrecoverable error or was abandoned.
    Failed,
}

impl RunnerState {
    /// Every state, in transition-table order.
    pub const ALL: [Self; 4] = [
        Self::Running,
        Self::SuspendedPendingApproval,
        Self::Completed,
        Self::Failed,
    ];

    /// Whether the state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Stable index into a per-state counter table.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Running => 0,
            Self::SuspendedPendingApproval => 1,
            Self::Completed => 2,
            Self::Failed => 3,
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::SuspendedPendingApproval => write!(f, "suspended_pending_approval"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Whether any session is consuming compute right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// At least one session is `running`.
    Busy,
    /// No session is `running`.
    Idle,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "busy"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunnerState::Running.is_terminal());
        assert!(!RunnerState::SuspendedPendingApproval.is_terminal());
        assert!(RunnerState::Completed.is_terminal());
        assert!(RunnerState::Failed.is_terminal());
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, state) in RunnerState::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&RunnerState::SuspendedPendingApproval).unwrap();
        assert_eq!(
            json,
            format!("\"{}\"", RunnerState::SuspendedPendingApproval)
        );
    }
}
