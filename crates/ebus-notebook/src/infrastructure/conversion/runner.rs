//! Interchangeable strategies for running the external converter.
//!
//! Every variant answers the same three questions: start a shell command,
//! wait for its exit code, terminate it.  Which one is used is a
//! configuration choice ([`ShowOption`]), resolved by [`runner_for`].
//!
//! | `show`  | Runner                          | Output                       |
//! |---------|---------------------------------|------------------------------|
//! | `no`    | [`TerminalRunner`] (hidden)     | discarded                    |
//! | `yes`   | [`TerminalRunner`] (visible)    | inherited from this process  |
//! | `task`  | [`TaskRunner`]                  | forwarded line by line to the log |

use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use ebus_core::ShowOption;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Starts external processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Short label used in log messages.
    fn name(&self) -> &'static str;

    /// Starts `command` through the platform shell.
    async fn start(&self, command: &str, cwd: Option<&Path>) -> io::Result<Box<dyn ProcessHandle>>;
}

/// A started process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Waits for exit; `None` when no exit code is available (killed by a
    /// signal).  Must be cancel-safe.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Kills the process if it is still running.
    async fn terminate(&mut self);
}

/// Returns the runner selected by `show`.
pub fn runner_for(show: ShowOption) -> Box<dyn ProcessRunner> {
    match show {
        ShowOption::No => Box::new(TerminalRunner { visible: false }),
        ShowOption::Yes => Box::new(TerminalRunner { visible: true }),
        ShowOption::Task => Box::new(TaskRunner),
    }
}

fn shell_command(command: &str, cwd: Option<&Path>) -> Command {
    #[cfg(unix)]
    let (shell, flag) = ("sh", "-c");

    #[cfg(windows)]
    let (shell, flag) = ("cmd", "/C");

    let mut cmd = Command::new(shell);
    cmd.arg(flag).arg(command).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Runs the command like a terminal would, shown or hidden.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRunner {
    /// Inherit stdout/stderr when `true`, discard them otherwise.
    pub visible: bool,
}

#[async_trait]
impl ProcessRunner for TerminalRunner {
    fn name(&self) -> &'static str {
        if self.visible {
            "terminal"
        } else {
            "hidden terminal"
        }
    }

    async fn start(&self, command: &str, cwd: Option<&Path>) -> io::Result<Box<dyn ProcessHandle>> {
        let mut cmd = shell_command(command, cwd);
        if self.visible {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        Ok(Box::new(ChildHandle(cmd.spawn()?)))
    }
}

/// Runs the command as a tracked background task, logging its output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRunner;

#[async_trait]
impl ProcessRunner for TaskRunner {
    fn name(&self) -> &'static str {
        "task"
    }

    async fn start(&self, command: &str, cwd: Option<&Path>) -> io::Result<Box<dyn ProcessHandle>> {
        let mut child = shell_command(command, cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, true));
        }
        Ok(Box::new(ChildHandle(child)))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: R, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(target: "conversion", "{line}");
        } else {
            info!(target: "conversion", "{line}");
        }
    }
}

struct ChildHandle(Child);

#[async_trait]
impl ProcessHandle for ChildHandle {
    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.0.wait().await?;
        Ok(status.code())
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.0.kill().await {
            debug!("conversion process already gone: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
