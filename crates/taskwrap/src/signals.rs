//! Signal trapping around the supervised task.
//!
//! A [`SignalGuard`] funnels every trapped signal, plus the exit-hook
//! pseudo-signal, into one dispatcher. The dispatcher disarms the guard
//! *before* it runs the callback, so a second delivery during cleanup is
//! counted and ignored instead of re-entering the callback.
//!
//! ## Unix
//! SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2 and SIGPIPE can be
//! trapped. Synchronous fault signals (SIGILL, SIGFPE, SIGSEGV) cannot be
//! handled from an async runtime and are not offered.
//!
//! Tokio keeps its OS-level handler registered once installed, so after the
//! guard disarms, late signals are absorbed rather than killing the process
//! in the middle of a notification.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use clap::ValueEnum;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use taskwrap_core::AbortReason;

/// Signals the guard can trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum TrapSignal {
    Hup,
    Int,
    Quit,
    Term,
    Usr1,
    Usr2,
    Pipe,
}

impl TrapSignal {
    /// Every trappable signal.
    pub const ALL: [TrapSignal; 7] = [
        Self::Hup,
        Self::Int,
        Self::Quit,
        Self::Term,
        Self::Usr1,
        Self::Usr2,
        Self::Pipe,
    ];

    /// Conventional signal name, used as the abort reason.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hup => "SIGHUP",
            Self::Int => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::Term => "SIGTERM",
            Self::Usr1 => "SIGUSR1",
            Self::Usr2 => "SIGUSR2",
            Self::Pipe => "SIGPIPE",
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Self::Hup => SignalKind::hangup(),
            Self::Int => SignalKind::interrupt(),
            Self::Quit => SignalKind::quit(),
            Self::Term => SignalKind::terminate(),
            Self::Usr1 => SignalKind::user_defined1(),
            Self::Usr2 => SignalKind::user_defined2(),
            Self::Pipe => SignalKind::pipe(),
        }
    }
}

impl fmt::Display for TrapSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One delivery observed by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// An OS signal.
    Signal(TrapSignal),
    /// The supervisor left its normal path without a signal.
    ExitHook,
}

impl Trap {
    /// Abort reason reported for this delivery.
    pub fn reason(&self) -> AbortReason {
        match self {
            Self::Signal(signal) => AbortReason::Signal(signal.name().to_string()),
            Self::ExitHook => AbortReason::ExitHook,
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => write!(f, "{}", signal),
            Self::ExitHook => f.write_str("exit hook"),
        }
    }
}

/// Stream of deliveries consumed by the guard's dispatcher.
pub type Deliveries = Pin<Box<dyn Stream<Item = Trap> + Send>>;

/// Subscribe to OS delivery of `signals`.
///
/// Handlers are registered with the OS before this returns.
#[cfg(unix)]
pub fn os_deliveries(signals: &[TrapSignal]) -> io::Result<Deliveries> {
    use tokio::signal::unix::signal;
    use tokio_stream::wrappers::SignalStream;
    use tokio_stream::StreamMap;

    let mut streams = StreamMap::new();
    for &trap in signals {
        streams.insert(trap, SignalStream::new(signal(trap.kind())?));
    }
    debug!(signals = ?signals, "Signal handlers installed");

    Ok(Box::pin(streams.map(|(trap, ())| Trap::Signal(trap))))
}

#[cfg(not(unix))]
pub fn os_deliveries(_signals: &[TrapSignal]) -> io::Result<Deliveries> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signal trapping requires a Unix platform",
    ))
}

/// Deliveries fed from a channel instead of the OS.
#[cfg(test)]
pub(crate) fn injected() -> (mpsc::UnboundedSender<Trap>, Deliveries) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Box::pin(UnboundedReceiverStream::new(rx)))
}

#[derive(Debug)]
struct GuardState {
    armed: AtomicBool,
    suppressed: AtomicUsize,
}

/// Owns signal interception for one supervised task.
///
/// The callback runs at most once, for the first delivery.
pub struct SignalGuard {
    state: Arc<GuardState>,
    exit_hook: mpsc::UnboundedSender<Trap>,
    dispatcher: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Start dispatching `deliveries` to `on_trap`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F, Fut>(deliveries: Deliveries, on_trap: F) -> Self
    where
        F: FnOnce(Trap) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::new(GuardState {
            armed: AtomicBool::new(true),
            suppressed: AtomicUsize::new(0),
        });

        let (exit_hook, hook_rx) = mpsc::unbounded_channel();
        let merged: Deliveries = Box::pin(deliveries.merge(UnboundedReceiverStream::new(hook_rx)));

        let dispatcher = tokio::spawn(dispatch(merged, state.clone(), on_trap));

        Self {
            state,
            exit_hook,
            dispatcher: Some(dispatcher),
        }
    }

    /// Deliver the exit-hook pseudo-signal.
    ///
    /// Returns false when the guard is already disarmed.
    pub fn fire_exit_hook(&self) -> bool {
        self.is_armed() && self.exit_hook.send(Trap::ExitHook).is_ok()
    }

    /// Returns true until the first delivery or [`SignalGuard::disarm`].
    pub fn is_armed(&self) -> bool {
        self.state.armed.load(Ordering::Acquire)
    }

    /// Deliveries ignored because the guard had already disarmed.
    pub fn suppressed(&self) -> usize {
        self.state.suppressed.load(Ordering::Acquire)
    }

    /// Stop dispatching. Idempotent.
    pub fn disarm(&mut self) {
        self.state.armed.store(false, Ordering::Release);
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
            debug!("Signal guard disarmed");
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn dispatch<F, Fut>(mut deliveries: Deliveries, state: Arc<GuardState>, on_trap: F)
where
    F: FnOnce(Trap) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let Some(trap) = deliveries.next().await else {
        return;
    };

    // Disarm before acting.
    if !state.armed.swap(false, Ordering::AcqRel) {
        return;
    }

    match trap {
        Trap::Signal(signal) => warn!(signal = signal.name(), "Trapped signal; aborting task"),
        Trap::ExitHook => info!("Exit hook fired"),
    }

    tokio::select! {
        _ = on_trap(trap) => {}
        _ = suppress(&mut deliveries, &state) => {}
    }
}

/// Count deliveries that arrive while the callback runs. Never returns.
async fn suppress(deliveries: &mut Deliveries, state: &GuardState) {
    while let Some(trap) = deliveries.next().await {
        let suppressed = state.suppressed.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(trap = %trap, suppressed, "Guard already disarmed; ignoring delivery");
    }
    std::future::pending::<()>().await;
}
