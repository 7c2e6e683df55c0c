//! Session-scoped list of actions a human has marked as trusted.

use std::collections::HashSet;
use std::sync::RwLock;

/// Actions that bypass the gate for the rest of one session.
///
/// Owned by a single session's gate, never shared across sessions.
#[derive(Debug, Default)]
pub struct TrustedActions {
    actions: RwLock<HashSet<String>>,
}

impl TrustedActions {
    /// Create an empty trust list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `action` has been trusted in this session.
    #[must_use]
    pub fn is_trusted(&self, action: &str) -> bool {
        self.actions
            .read()
            .unwrap_or_else(|e| {
                tracing::warn!("TrustedActions read lock poisoned, recovering");
                e.into_inner()
            })
            .contains(action)
    }

    /// Trust `action` for the remainder of the session.
    ///
    /// Returns `true` if the action was not already trusted.
    pub fn trust(&self, action: impl Into<String>) -> bool {
        self.actions
            .write()
            .unwrap_or_else(|e| {
                tracing::warn!("TrustedActions lock poisoned, recovering");
                e.into_inner()
            })
            .insert(action.into())
    }

    /// Forget every trusted action. Called when the session ends.
    pub fn clear(&self) {
        if let Ok(mut actions) = self.actions.write() {
            actions.clear();
        }
    }

    /// Snapshot of trusted action names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .actions
            .read()
            .map(|a| a.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}
