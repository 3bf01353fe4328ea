//! Launching and observing the supervised child.

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::info;

use taskwrap_core::TaskContext;

/// The job to run: a program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    program: String,
    args: Vec<String>,
}

impl ChildCommand {
    /// Create a command from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv vector; `None` when it is empty.
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut argv = argv.into_iter();
        let program = argv.next()?;
        Some(Self::new(program, argv))
    }

    /// Program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Spawn the child with inherited stdio and the task context exported
    /// to its environment.
    pub fn spawn(&self, context: &TaskContext) -> io::Result<RunningChild> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .envs(context.env_vars())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        info!(
            task = context.task().leaf(),
            program = %self.program,
            pid = ?child.id(),
            "Child started"
        );
        Ok(RunningChild { inner: child })
    }
}

impl fmt::Display for ChildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A spawned child process.
///
/// Dropping it does not kill the process.
#[derive(Debug)]
pub struct RunningChild {
    inner: Child,
}

impl RunningChild {
    /// OS process id, while the child has not been reaped.
    pub fn id(&self) -> Option<u32> {
        self.inner.id()
    }

    /// Wait for the child to exit. Cancel safe.
    pub async fn wait(&mut self) -> io::Result<ChildExit> {
        self.inner.wait().await.map(ChildExit::from)
    }
}

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    code: Option<i32>,
    signal: Option<i32>,
}

impl ChildExit {
    /// Returns true for exit status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, if the child exited normally.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Terminating signal number, if the child was killed.
    pub fn signal(&self) -> Option<i32> {
        self.signal
    }
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}
