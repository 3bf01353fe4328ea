//! Lifecycle states and the ways a task can end.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a task was aborted.
///
/// The reason string is what the orchestrator records, so it is kept
/// stable: see [`AbortReason::as_str`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The child command could not be launched.
    SpawnFailure,
    /// The child exited with a non-zero status or was killed.
    NonzeroExit,
    /// A trapped signal arrived; carries the signal name (e.g. `SIGINT`).
    Signal(String),
    /// The supervisor left its normal path without a trapped signal.
    ExitHook,
}

impl AbortReason {
    /// Reason string sent to the orchestrator.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SpawnFailure => "spawn-failure",
            Self::NonzeroExit => "nonzero-exit",
            Self::Signal(name) => name,
            Self::ExitHook => "exit-hook",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a supervised task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Termination {
    /// Child exited cleanly.
    Completed,
    /// Any failure path.
    Aborted(AbortReason),
}

impl Termination {
    /// Returns true for the successful outcome.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// Where the supervised task is in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Orchestrator not yet told about this run.
    #[default]
    NotStarted,
    /// Start acknowledged; child may be executing.
    Running,
    /// Exactly one terminal notification has been claimed.
    Terminated(Termination),
}

impl LifecycleState {
    /// Returns true if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Terminated(_) => "Terminated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        assert_eq!(AbortReason::SpawnFailure.as_str(), "spawn-failure");
        assert_eq!(AbortReason::NonzeroExit.as_str(), "nonzero-exit");
        assert_eq!(AbortReason::Signal("SIGINT".into()).as_str(), "SIGINT");
        assert_eq!(AbortReason::ExitHook.to_string(), "exit-hook");
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::Completed.to_string(), "completed");
        assert_eq!(
            Termination::Aborted(AbortReason::NonzeroExit).to_string(),
            "aborted (nonzero-exit)"
        );
    }

    #[test]
    fn test_state_serialization() {
        let state = LifecycleState::Terminated(Termination::Aborted(AbortReason::Signal(
            "SIGTERM".into(),
        )));
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"TERMINATED":{"ABORTED":{"signal":"SIGTERM"}}}"#);
        assert!(state.is_terminal());
        assert!(!LifecycleState::Running.is_terminal());
    }
}
