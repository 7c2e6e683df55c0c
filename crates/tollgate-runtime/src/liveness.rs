//! Busy/idle signal for external pollers.
//!
//! The runner reports every state transition here; the reporter keeps one
//! atomic counter per [`RunnerState`]. A probe is a single atomic load, so it
//! answers promptly no matter how many sessions exist or what they are doing.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use tollgate_core::{Liveness, RunnerState};

/// Number of registered sessions in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Sessions actively computing.
    pub running: usize,
    /// Sessions parked at the gate.
    pub suspended_pending_approval: usize,
    /// Sessions that finished normally.
    pub completed: usize,
    /// Sessions that failed or were abandoned.
    pub failed: usize,
}

/// Liveness plus the table it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessReport {
    /// `busy` iff at least one session is running.
    pub liveness: Liveness,
    /// Per-state session counts.
    pub counts: StateCounts,
}

/// Event-driven transition table backing the liveness probe.
#[derive(Debug)]
pub struct LivenessReporter {
    counts: [AtomicUsize; 4],
    signal: watch::Sender<Liveness>,
}

impl Default for LivenessReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessReporter {
    /// Create a reporter with no sessions.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(Liveness::Idle);
        Self {
            counts: Default::default(),
            signal,
        }
    }

    fn slot(&self, state: RunnerState) -> &AtomicUsize {
        &self.counts[state.index()]
    }

    /// Record a transition. `from = None` registers a new session.
    ///
    /// Callers hold the session's lock, so transitions of one session are
    /// applied in order.
    pub fn transition(&self, from: Option<RunnerState>, to: RunnerState) {
        if from == Some(to) {
            return;
        }
        self.slot(to).fetch_add(1, Ordering::SeqCst);
        if let Some(from) = from {
            self.decrement(from);
        }
        self.publish();
    }

    /// Drop a session from the table. Used by explicit cleanup.
    pub fn forget(&self, state: RunnerState) {
        self.decrement(state);
        self.publish();
    }

    fn decrement(&self, state: RunnerState) {
        let _ = self
            .slot(state)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
    }

    fn publish(&self) {
        let now = self.probe();
        self.signal.send_if_modified(|current| {
            if *current == now {
                false
            } else {
                *current = now;
                true
            }
        });
    }

    /// `Busy` iff at least one session is running.
    #[must_use]
    pub fn probe(&self) -> Liveness {
        if self.slot(RunnerState::Running).load(Ordering::SeqCst) > 0 {
            Liveness::Busy
        } else {
            Liveness::Idle
        }
    }

    /// Current per-state counts.
    #[must_use]
    pub fn counts(&self) -> StateCounts {
        let load = |s: RunnerState| self.slot(s).load(Ordering::SeqCst);
        StateCounts {
            running: load(RunnerState::Running),
            suspended_pending_approval: load(RunnerState::SuspendedPendingApproval),
            completed: load(RunnerState::Completed),
            failed: load(RunnerState::Failed),
        }
    }

    /// Probe together with the counts.
    #[must_use]
    pub fn report(&self) -> LivenessReport {
        LivenessReport {
            liveness: self.probe(),
            counts: self.counts(),
        }
    }

    /// Watch busy/idle flips.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Liveness> {
        self.signal.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_idle() {
        let r = LivenessReporter::new();
        assert_eq!(r.probe(), Liveness::Idle);
        assert_eq!(r.counts(), StateCounts::default());
    }

    #[test]
    fn test_busy_until_all_suspended() {
        let r = LivenessReporter::new();
        r.transition(None, RunnerState::Running);
        r.transition(None, RunnerState::Running);
        assert_eq!(r.probe(), Liveness::Busy);

        r.transition(
            Some(RunnerState::Running),
            RunnerState::SuspendedPendingApproval,
        );
        assert_eq!(r.probe(), Liveness::Busy);

        r.transition(
            Some(RunnerState::Running),
            RunnerState::SuspendedPendingApproval,
        );
        assert_eq!(r.probe(), Liveness::Idle);
        assert_eq!(r.counts().suspended_pending_approval, 2);
    }

    #[test]
    fn test_forget_removes_terminal_session() {
        let r = LivenessReporter::new();
        r.transition(None, RunnerState::Running);
        r.transition(Some(RunnerState::Running), RunnerState::Completed);
        assert_eq!(r.counts().completed, 1);
        r.forget(RunnerState::Completed);
        assert_eq!(r.counts(), StateCounts::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_flips() {
        let r = LivenessReporter::new();
        let mut rx = r.subscribe();
        r.transition(None, RunnerState::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Liveness::Busy);

        r.transition(Some(RunnerState::Running), RunnerState::Failed);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Liveness::Idle);
    }
}
