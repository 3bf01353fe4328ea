//! Task supervision: start, run, and report exactly one outcome.
//!
//! ```text
//! notify_start ──► arm SignalGuard ──► spawn child ──► wait
//!                        │                              │
//!                 signal / exit hook             exit 0 │ exit != 0
//!                        │                              │
//!                        ▼                              ▼
//!                 Terminator::abort ◄──────── complete / abort
//!                        │
//!                 TerminationLatch (first caller wins, others wait)
//!                        │
//!                 notify_abort / notify_complete ──► Outcome
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use taskwrap_client::{ClientError, OrchestratorClient};
use taskwrap_core::{AbortReason, CoreError, Lifecycle, TaskContext, Termination};

use crate::child::{ChildCommand, ChildExit};
use crate::signals::{self, Deliveries, SignalGuard, Trap, TrapSignal};

/// Exit code when a terminal notification could not be delivered.
pub const EXIT_NOTIFY_FAILURE: u8 = 3;

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// How long the child may keep running after a trapped signal.
    pub grace_period: Duration,

    /// Exit code once an abort has been delivered.
    pub abort_exit_code: u8,

    /// Signals intercepted while the child runs.
    pub signals: Vec<TrapSignal>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(10),
            abort_exit_code: 1,
            signals: TrapSignal::ALL.to_vec(),
        }
    }
}

/// Failures that end supervision before a terminal notification is possible.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The orchestrator never heard that the task started.
    #[error("start notification failed: {0}")]
    Start(#[source] ClientError),

    #[error(transparent)]
    Lifecycle(#[from] CoreError),

    /// Waiting on the child failed.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),
}

/// Result of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// How the task ended.
    pub termination: Termination,

    /// Whether the terminal notification reached the orchestrator.
    pub delivery: Result<(), String>,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self, abort_exit_code: u8) -> u8 {
        match (&self.delivery, &self.termination) {
            (Err(_), _) => EXIT_NOTIFY_FAILURE,
            (Ok(()), Termination::Completed) => 0,
            (Ok(()), Termination::Aborted(_)) => abort_exit_code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildState {
    NotSpawned,
    /// Committed to spawning; no trap can claim the latch unseen.
    Spawning,
    Running(Option<u32>),
    Exited(ChildExit),
}

/// Single decision point shared by the body and the signal dispatcher.
struct Terminator {
    client: Arc<dyn OrchestratorClient>,
    lifecycle: Lifecycle,
    grace_period: Duration,
    child: watch::Sender<ChildState>,
    outcome: watch::Sender<Option<Outcome>>,
}

impl Terminator {
    fn new(client: Arc<dyn OrchestratorClient>, grace_period: Duration) -> Self {
        let (child, _) = watch::channel(ChildState::NotSpawned);
        let (outcome, _) = watch::channel(None);
        Self {
            client,
            lifecycle: Lifecycle::new(),
            grace_period,
            child,
            outcome,
        }
    }

    fn is_claimed(&self) -> bool {
        self.lifecycle.is_terminated()
    }

    /// Commit to spawning the child unless termination is already claimed.
    ///
    /// The check and the state change happen under the child channel's
    /// lock. An abort that claims the latch afterwards will see `Spawning`
    /// and give the child its grace period.
    fn begin_spawn(&self) -> bool {
        self.child.send_if_modified(|state| {
            if self.is_claimed() {
                return false;
            }
            *state = ChildState::Spawning;
            true
        })
    }

    fn spawn_failed(&self) {
        self.child.send_replace(ChildState::NotSpawned);
    }

    fn child_running(&self, pid: Option<u32>) {
        self.child.send_replace(ChildState::Running(pid));
    }

    fn child_exited(&self, exit: ChildExit) {
        self.child.send_replace(ChildState::Exited(exit));
    }

    async fn complete(&self) -> Outcome {
        if !self.lifecycle.try_terminate(Termination::Completed) {
            debug!("Termination already claimed; completion is a no-op");
            return self.settled().await;
        }

        let claim = Claim::new(self, Termination::Completed);
        let delivery = self.client.notify_complete().await;
        claim.settle(delivery)
    }

    async fn abort(&self, reason: AbortReason) -> Outcome {
        let termination = Termination::Aborted(reason.clone());
        if !self.lifecycle.try_terminate(termination.clone()) {
            debug!(reason = %reason, "Termination already claimed; abort is a no-op");
            return self.settled().await;
        }

        let claim = Claim::new(self, termination);
        self.await_child().await;
        let delivery = self.client.notify_abort(reason.as_str()).await;
        claim.settle(delivery)
    }

    /// Give a running child the grace period to exit. Never kills it.
    async fn await_child(&self) {
        let mut rx = self.child.subscribe();
        let pid = match *rx.borrow_and_update() {
            ChildState::Running(pid) => pid,
            ChildState::Spawning => None,
            ChildState::NotSpawned | ChildState::Exited(_) => return,
        };

        info!(
            pid = ?pid,
            grace_secs = self.grace_period.as_secs_f64(),
            "Waiting for child to exit"
        );
        let exited = rx.wait_for(|state| {
            !matches!(state, ChildState::Spawning | ChildState::Running(_))
        });
        let waited = tokio::time::timeout(self.grace_period, exited)
            .await
            .map(|state| state.ok().map(|state| *state));
        match waited {
            Ok(Some(ChildState::Exited(exit))) => {
                debug!(pid = ?pid, exit = %exit, "Child exited within grace period");
            }
            Ok(_) => {}
            Err(_) => warn!(pid = ?pid, "Child still running after grace period; proceeding"),
        }
    }

    fn settle(&self, termination: Termination, delivery: Result<(), String>) -> Outcome {
        match &delivery {
            Ok(()) => info!(termination = %termination, "Orchestrator notified"),
            Err(e) => error!(termination = %termination, error = %e, "Terminal notification failed"),
        }

        let outcome = Outcome {
            termination,
            delivery,
        };
        self.outcome.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Wait for whichever caller claimed the latch to finish notifying.
    async fn settled(&self) -> Outcome {
        let mut rx = self.outcome.subscribe();
        let settled = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());

        settled.unwrap_or_else(|| Outcome {
            termination: Termination::Aborted(AbortReason::ExitHook),
            delivery: Err("outcome channel closed".to_string()),
        })
    }
}

/// Held by whoever won the latch until the outcome is published.
///
/// Dropped unsettled (the notifying task panicked or was cancelled), it
/// publishes a failed delivery so callers waiting on `settled` return.
struct Claim<'a> {
    terminator: &'a Terminator,
    termination: Termination,
    settled: bool,
}

impl<'a> Claim<'a> {
    fn new(terminator: &'a Terminator, termination: Termination) -> Self {
        Self {
            terminator,
            termination,
            settled: false,
        }
    }

    fn settle(mut self, delivery: Result<(), ClientError>) -> Outcome {
        self.settled = true;
        self.terminator.settle(
            self.termination.clone(),
            delivery.map_err(|e| e.to_string()),
        )
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.terminator.settle(
                self.termination.clone(),
                Err("terminal notification interrupted".to_string()),
            );
        }
    }
}

/// Runs one child task and reports its lifecycle to the orchestrator.
pub struct TaskSupervisor {
    context: TaskContext,
    client: Arc<dyn OrchestratorClient>,
    settings: SupervisorSettings,
    deliveries: Option<Deliveries>,
}

impl TaskSupervisor {
    /// Create a supervisor trapping OS signals per `settings`.
    pub fn new(
        context: TaskContext,
        client: Arc<dyn OrchestratorClient>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            context,
            client,
            settings,
            deliveries: None,
        }
    }

    /// Use `deliveries` instead of OS signals.
    #[cfg(test)]
    fn with_deliveries(mut self, deliveries: Deliveries) -> Self {
        self.deliveries = Some(deliveries);
        self
    }

    /// Supervise `command` to its end.
    ///
    /// Returns `Err` only when the start notification fails; every later
    /// failure is reported to the orchestrator and folded into the outcome.
    pub async fn run(mut self, command: ChildCommand) -> Result<Outcome, SupervisorError> {
        let rid = self.context.rid();
        info!(
            task = %self.context.task(),
            rid = %rid,
            try_no = self.context.try_no(),
            "Notifying orchestrator of start"
        );
        self.client
            .notify_start(rid)
            .await
            .map_err(SupervisorError::Start)?;

        let terminator = Arc::new(Terminator::new(
            self.client.clone(),
            self.settings.grace_period,
        ));
        terminator.lifecycle.start()?;

        let deliveries = match self.deliveries.take() {
            Some(deliveries) => deliveries,
            None => match signals::os_deliveries(&self.settings.signals) {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return Ok(terminator.abort(AbortReason::ExitHook).await);
                }
            },
        };

        let on_trap = {
            let terminator = terminator.clone();
            move |trap: Trap| async move {
                terminator.abort(trap.reason()).await;
            }
        };
        let mut guard = SignalGuard::arm(deliveries, on_trap);

        // The body runs as its own task so early errors and panics still
        // reach the exit hook below.
        let body = tokio::spawn(supervise(
            terminator.clone(),
            self.context.clone(),
            command,
        ));

        let outcome = match body.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Supervision failed");
                exit_hook(&guard, &terminator).await
            }
            Err(e) => {
                error!(error = %e, "Supervision task panicked");
                exit_hook(&guard, &terminator).await
            }
        };

        let suppressed = guard.suppressed();
        guard.disarm();
        info!(
            suppressed,
            task = %self.context.task(),
            termination = %outcome.termination,
            delivered = outcome.delivery.is_ok(),
            "Supervision finished"
        );
        Ok(outcome)
    }
}

async fn supervise(
    terminator: Arc<Terminator>,
    context: TaskContext,
    command: ChildCommand,
) -> Result<Outcome, SupervisorError> {
    if !terminator.begin_spawn() {
        info!(command = %command, "Trapped before launch; child not started");
        return Ok(terminator.settled().await);
    }

    let mut child = match command.spawn(&context) {
        Ok(child) => child,
        Err(e) => {
            terminator.spawn_failed();
            error!(program = %command.program(), error = %e, "Failed to spawn child");
            return Ok(terminator.abort(AbortReason::SpawnFailure).await);
        }
    };
    terminator.child_running(child.id());

    let exit = tokio::select! {
        exit = child.wait() => exit.map_err(SupervisorError::Wait)?,
        // A trap settled while the child outlived its grace period.
        outcome = terminator.settled() => return Ok(outcome),
    };
    terminator.child_exited(exit);

    if exit.success() {
        info!(command = %command, "Child completed");
        Ok(terminator.complete().await)
    } else {
        warn!(
            command = %command,
            code = ?exit.code(),
            signal = ?exit.signal(),
            "Child failed"
        );
        Ok(terminator.abort(AbortReason::NonzeroExit).await)
    }
}

/// Route an abnormal end of the body through the guard's exit hook.
async fn exit_hook(guard: &SignalGuard, terminator: &Terminator) -> Outcome {
    if !guard.fire_exit_hook() {
        debug!("Guard already disarmed; waiting for the trap in progress");
    }
    terminator.settled().await
}
