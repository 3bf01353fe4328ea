//! End-to-end runs of the taskwrap binary against a fake orchestrator client.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_taskwrap");

/// Temp directory holding a fake client program that appends its request
/// flag to `calls.log`.
struct Harness {
    dir: TempDir,
    client: PathBuf,
    log: PathBuf,
}

impl Harness {
    fn new() -> Self {
        Self::with_client_body("")
    }

    /// Fake client that exits 1 when invoked with `flag`.
    fn rejecting(flag: &str) -> Self {
        Self::with_client_body(&format!("case \"$1\" in {}*) exit 1;; esac", flag))
    }

    fn with_client_body(extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let client = dir.path().join("fake_client");
        fs::write(
            &client,
            format!("#!/bin/sh\necho \"$1\" >> '{}'\n{}\n", log.display(), extra),
        )
        .unwrap();
        fs::set_permissions(&client, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, client, log }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn envs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ECF_HOST", "localhost".to_string()),
            ("ECF_PORT", "3141".to_string()),
            ("ECF_NAME", "/suite/family/task".to_string()),
            ("ECF_PASS", "s3cret".to_string()),
            ("ECF_TRYNO", "1".to_string()),
            ("TASKWRAP_CLIENT", self.client.display().to_string()),
        ]
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(BIN);
        cmd.envs(self.envs()).env_remove("RUST_LOG");
        cmd
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }
}

fn wait_for(path: &Path, deadline: Duration) {
    let started = Instant::now();
    while !path.exists() {
        assert!(started.elapsed() < deadline, "{} never appeared", path.display());
        thread::sleep(Duration::from_millis(20));
    }
}

fn send_signal(pid: u32, signal: &str) {
    let status = std::process::Command::new("kill")
        .args([signal, &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

fn wait_exit(child: &mut std::process::Child, deadline: Duration) -> std::process::ExitStatus {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        assert!(started.elapsed() < deadline, "supervisor did not exit in time");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_help() {
    Command::new(BIN)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--grace-period-secs"))
        .stdout(predicate::str::contains("--trap"));
}

#[test]
fn test_clean_exit_completes() {
    let harness = Harness::new();

    harness
        .command()
        .args(["--", "sh", "-c", "echo job output"])
        .assert()
        .success()
        .stdout(predicate::eq("job output\n"));

    let calls = harness.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("--init="));
    assert_eq!(calls[1], "--complete");
}

#[test]
fn test_nonzero_exit_aborts() {
    let harness = Harness::new();

    harness
        .command()
        .args(["--", "sh", "-c", "exit 17"])
        .assert()
        .code(1);

    let calls = harness.calls();
    assert!(calls[0].starts_with("--init="));
    assert_eq!(calls[1..], ["--abort=nonzero-exit".to_string()]);
}

#[test]
fn test_abort_exit_code_zero() {
    let harness = Harness::new();

    harness
        .command()
        .args(["--abort-exit-code", "0", "--", "sh", "-c", "exit 17"])
        .assert()
        .success();

    assert_eq!(harness.calls().last().map(String::as_str), Some("--abort=nonzero-exit"));
}

#[test]
fn test_spawn_failure_aborts() {
    let harness = Harness::new();

    harness
        .command()
        .args(["--", "/nonexistent/taskwrap-job"])
        .assert()
        .code(1);

    assert_eq!(harness.calls().last().map(String::as_str), Some("--abort=spawn-failure"));
}

#[test]
fn test_missing_config_never_contacts_orchestrator() {
    let harness = Harness::new();

    harness
        .command()
        .env_remove("ECF_HOST")
        .args(["--", "true"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ECF_HOST"));

    assert!(harness.calls().is_empty());
}

#[test]
fn test_start_failure_skips_child() {
    let harness = Harness::rejecting("--init");
    let marker = harness.path("ran");

    harness
        .command()
        .args(["--", "touch", &marker.display().to_string()])
        .assert()
        .code(3);

    assert_eq!(harness.calls().len(), 1);
    assert!(!marker.exists());
}

#[test]
fn test_failed_completion_exits_nonzero() {
    let harness = Harness::rejecting("--complete");

    harness.command().args(["--", "true"]).assert().code(3);

    assert_eq!(harness.calls().last().map(String::as_str), Some("--complete"));
}

#[test]
fn test_interrupt_while_running() {
    let harness = Harness::new();
    let marker = harness.path("started");

    let mut supervisor = std::process::Command::new(BIN)
        .envs(harness.envs())
        .args(["--grace-period-secs", "1", "--", "sh", "-c"])
        .arg(format!("touch '{}'; sleep 3", marker.display()))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // The child only starts once the guard is armed.
    wait_for(&marker, Duration::from_secs(10));
    send_signal(supervisor.id(), "-INT");

    let status = wait_exit(&mut supervisor, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));

    let calls = harness.calls();
    assert!(calls[0].starts_with("--init="));
    assert_eq!(calls[1..], ["--abort=SIGINT".to_string()]);
}

#[test]
fn test_signal_burst_aborts_once() {
    let harness = Harness::new();
    let marker = harness.path("started");

    let mut supervisor = std::process::Command::new(BIN)
        .envs(harness.envs())
        .args(["--grace-period-secs", "1", "--", "sh", "-c"])
        .arg(format!("touch '{}'; sleep 3", marker.display()))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    wait_for(&marker, Duration::from_secs(10));
    let pid = supervisor.id().to_string();
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid, &pid])
        .status()
        .unwrap();
    assert!(status.success());
    send_signal(supervisor.id(), "-HUP");

    let status = wait_exit(&mut supervisor, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));

    let terminal: Vec<String> = harness
        .calls()
        .into_iter()
        .filter(|call| !call.starts_with("--init="))
        .collect();
    assert_eq!(terminal, vec!["--abort=SIGTERM".to_string()]);
}
