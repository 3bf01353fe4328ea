//! Lifecycle bookkeeping around the termination latch.

use std::sync::{Mutex, PoisonError};

use crate::error::CoreError;
use crate::latch::TerminationLatch;
use crate::status::{LifecycleState, Termination};

/// Tracks `NotStarted -> Running -> Terminated` for one supervised task.
///
/// The latch decides who terminates; the state only records the result so
/// it can be observed and logged.
#[derive(Debug, Default)]
pub struct Lifecycle {
    latch: TerminationLatch,
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    /// Create a lifecycle in `NotStarted`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the orchestrator acknowledged the start.
    pub fn start(&self) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != LifecycleState::NotStarted {
            return Err(CoreError::InvalidStateTransition {
                from: state.name().to_string(),
                to: "Running".to_string(),
            });
        }
        *state = LifecycleState::Running;
        Ok(())
    }

    /// Claim the terminal transition.
    ///
    /// Returns true for exactly one caller over the lifetime of the
    /// lifecycle; every later call is a no-op returning false.
    pub fn try_terminate(&self, termination: Termination) -> bool {
        if !self.latch.try_trip() {
            return false;
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) =
            LifecycleState::Terminated(termination);
        true
    }

    /// Returns true once the terminal transition has been claimed.
    pub fn is_terminated(&self) -> bool {
        self.latch.is_tripped()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> LifecycleState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::AbortReason;

    #[test]
    fn test_normal_progression() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::NotStarted);

        lifecycle.start().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        assert!(lifecycle.try_terminate(Termination::Completed));
        assert_eq!(
            lifecycle.state(),
            LifecycleState::Terminated(Termination::Completed)
        );
    }

    #[test]
    fn test_double_start_rejected() {
        let lifecycle = Lifecycle::new();
        lifecycle.start().unwrap();
        let err = lifecycle.start().unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_first_termination_wins() {
        let lifecycle = Lifecycle::new();
        lifecycle.start().unwrap();

        assert!(lifecycle.try_terminate(Termination::Aborted(AbortReason::Signal(
            "SIGINT".into()
        ))));
        assert!(!lifecycle.try_terminate(Termination::Completed));
        assert!(!lifecycle.try_terminate(Termination::Aborted(AbortReason::ExitHook)));

        assert!(lifecycle.is_terminated());
        assert_eq!(
            lifecycle.state(),
            LifecycleState::Terminated(Termination::Aborted(AbortReason::Signal(
                "SIGINT".into()
            )))
        );
    }
}
