//! Shell command execution.
//!
//! Every manifest command is one opaque string handed to `<shell> -c`. The exit
//! code is the whole contract: `0` passes, anything else (or no exit code at
//! all, when the process was killed or never started) fails.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::env::EnvVars;

/// Captured output is capped to this many bytes, keeping the tail.
pub const MAX_OUTPUT: usize = 10 * 1024;

// ---------------------------------------------------------------------------
// CommandOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, trimmed and capped to [`MAX_OUTPUT`].
    pub output: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn failed(command: &str, output: String) -> Self {
        Self {
            command: command.to_string(),
            exit_code: None,
            output,
            duration_ms: 0,
            timed_out: false,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Executes one command string to completion.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, cwd: &Path, env: &EnvVars) -> CommandOutcome;
}

/// Runs commands through a real shell.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: None,
        }
    }

    /// `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, cwd: &Path, env: &EnvVars) -> CommandOutcome {
        if command.trim().is_empty() {
            return CommandOutcome::failed(command, "command is empty".to_string());
        }
        tracing::debug!(shell = %self.shell, command, "running");
        let start = Instant::now();
        let mut outcome = execute(&self.shell, command, cwd, env, self.timeout);
        outcome.duration_ms = start.elapsed().as_millis() as u64;
        outcome
    }
}

/// Records commands without executing them; every command passes.
#[derive(Debug, Clone, Default)]
pub struct DryRunner;

impl CommandRunner for DryRunner {
    fn run(&self, command: &str, _cwd: &Path, _env: &EnvVars) -> CommandOutcome {
        CommandOutcome {
            command: command.to_string(),
            exit_code: Some(0),
            output: String::new(),
            duration_ms: 0,
            timed_out: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Process plumbing
// ---------------------------------------------------------------------------

/// How long the reader threads get to hand over what a killed command wrote.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Spawn `shell -c command` and wait for it, optionally with a timeout.
///
/// Stdout and stderr are drained on dedicated threads so a chatty command
/// cannot fill a pipe buffer and block. The timeout uses a waiter thread and
/// `recv_timeout`; on expiry the command's whole process group is killed and
/// whatever it printed so far is kept.
fn execute(
    shell: &str,
    command: &str,
    cwd: &Path,
    env: &EnvVars,
    timeout: Option<Duration>,
) -> CommandOutcome {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own group, so a kill reaches subshells and pipelines too.
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return CommandOutcome::failed(command, format!("failed to spawn {shell}: {e}")),
    };

    let child_pid = child.id();

    let (done_tx, done_rx) = mpsc::channel();
    let stdout_buf = spawn_reader(child.stdout.take(), done_tx.clone());
    let stderr_buf = spawn_reader(child.stderr.take(), done_tx);

    let wait_result = match timeout {
        None => child.wait(),
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result,
                Err(_) => {
                    kill_process(child_pid);
                    let deadline = Instant::now() + DRAIN_GRACE;
                    for _ in 0..2 {
                        let left = deadline.saturating_duration_since(Instant::now());
                        if done_rx.recv_timeout(left).is_err() {
                            break;
                        }
                    }
                    let captured = combine_output(&snapshot(&stdout_buf), &snapshot(&stderr_buf));
                    let note = format!("timed out after {}s", limit.as_secs_f64());
                    let output = if captured.is_empty() {
                        note
                    } else {
                        tail(&format!("{captured}\n{note}"), MAX_OUTPUT).to_string()
                    };
                    let mut outcome = CommandOutcome::failed(command, output);
                    outcome.timed_out = true;
                    return outcome;
                }
            }
        }
    };

    for _ in 0..2 {
        if done_rx.recv().is_err() {
            break;
        }
    }

    match wait_result {
        Ok(status) => CommandOutcome {
            command: command.to_string(),
            exit_code: status.code(),
            output: combine_output(&snapshot(&stdout_buf), &snapshot(&stderr_buf)),
            duration_ms: 0,
            timed_out: false,
        },
        Err(e) => CommandOutcome::failed(command, format!("wait failed: {e}")),
    }
}

type SharedBuf = Arc<Mutex<Vec<u8>>>;

/// Read `handle` to EOF on a new thread, appending to the returned buffer as
/// bytes arrive. Sends on `done` when the pipe closes.
fn spawn_reader<R: Read + Send + 'static>(handle: Option<R>, done: mpsc::Sender<()>) -> SharedBuf {
    let buf = SharedBuf::default();
    let sink = Arc::clone(&buf);
    std::thread::spawn(move || {
        if let Some(mut r) = handle {
            let mut chunk = [0u8; 8192];
            loop {
                match r.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        }
        let _ = done.send(());
    });
    buf
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot(buf: &Mutex<Vec<u8>>) -> String {
    String::from_utf8_lossy(&lock(buf)).into_owned()
}

/// Combine stdout/stderr and keep the last [`MAX_OUTPUT`] bytes.
fn combine_output(stdout: &str, stderr: &str) -> String {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    tail(output.trim(), MAX_OUTPUT).to_string()
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// SIGKILL the process group led by `pid`. Best-effort.
#[cfg(unix)]
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(not(unix))]
fn kill_process(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
