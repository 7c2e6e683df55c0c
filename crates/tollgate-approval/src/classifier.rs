//! Classification of actions that require human sign-off.

use std::collections::HashSet;

/// Actions gated by default when no list is configured.
pub const DEFAULT_SENSITIVE_ACTIONS: &[&str] = &["delete_files", "execute_command", "modify_database"];

/// Decides whether an action must pass through the approval gate.
///
/// ```
/// use tollgate_approval::ActionClassifier;
///
/// let classifier = ActionClassifier::default();
/// assert!(classifier.requires_approval("delete_files"));
/// assert!(!classifier.requires_approval("read_file"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionClassifier {
    sensitive: HashSet<String>,
}

impl ActionClassifier {
    /// Build a classifier from a list of action names.
    #[must_use]
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sensitive: actions
                .into_iter()
                .map(Into::into)
                .map(|a: String| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// Whether `action` must be approved before running.
    #[must_use]
    pub fn requires_approval(&self, action: &str) -> bool {
        self.sensitive.contains(action)
    }

    /// Number of gated actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sensitive.len()
    }

    /// Whether nothing is gated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensitive.is_empty()
    }
}

impl Default for ActionClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_ACTIONS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_list_trims_and_drops_blanks() {
        let c = ActionClassifier::new([" deploy ", "", "drop_table"]);
        assert_eq!(c.len(), 2);
        assert!(c.requires_approval("deploy"));
        assert!(c.requires_approval("drop_table"));
        assert!(!c.requires_approval("delete_files"));
    }

    #[test]
    fn test_empty_list_gates_nothing() {
        let c = ActionClassifier::new(Vec::<String>::new());
        assert!(c.is_empty());
        assert!(!c.requires_approval("delete_files"));
    }
}
