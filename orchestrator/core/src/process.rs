// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! External command execution.
//!
//! Everything the orchestrator does to the outside world goes through a
//! [`CommandRunner`]: `docker compose` for the stacks and `git` for the
//! Supabase checkout. Commands are argv arrays, never shell strings, and
//! every invocation is synchronous from the caller's point of view — the
//! orchestrator is blocked on the child until it exits or the operator
//! interrupts the run.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// How long a signaled child gets to exit on its own before being killed.
const SIGNAL_GRACE: Duration = Duration::from_secs(5);

/// Trailing stderr bytes kept for error reports.
const STDERR_TAIL: usize = 2048;

/// One subprocess invocation: argv plus the knobs the reconcilers need.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Collect stdout/stderr instead of inheriting the caller's.
    pub capture: bool,
    /// Turn a non-zero exit into [`ProcessError::Failed`].
    pub check: bool,
}

impl RunRequest {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            env: BTreeMap::new(),
            capture: false,
            check: true,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    /// Rendering used in logs and error reports.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Exit status and any captured output of a finished child.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{}", describe_failure(.command, .code, .stderr_tail))]
    Failed {
        command: String,
        code: i32,
        stderr_tail: Option<String>,
    },
    #[error("`{command}` interrupted by signal")]
    Interrupted { command: String },
}

impl ProcessError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

fn describe_failure(command: &str, code: &i32, stderr_tail: &Option<String>) -> String {
    match stderr_tail {
        Some(tail) => format!("`{command}` exited with status {code}\n{tail}"),
        None => format!("`{command}` exited with status {code}"),
    }
}

/// Seam between the reconcilers and the host: the stack launcher and the
/// sub-repo acquirer take `&dyn CommandRunner` so tests can substitute a
/// recording fake.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, req: RunRequest) -> Result<RunOutput, ProcessError>;
}

/// Spawns real processes on the host, resolving `argv[0]` via `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, req: RunRequest) -> Result<RunOutput, ProcessError> {
        let command = req.display();
        let Some((program, args)) = req.argv.split_first() else {
            return Err(ProcessError::Spawn {
                command,
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty argv"),
            });
        };

        debug!(%command, capture = req.capture, "spawning");
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &req.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &req.env {
            cmd.env(key, value);
        }
        if req.capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let finished = tokio::select! {
            finished = run_to_completion(&mut child, stdout_pipe, stderr_pipe) => Some(finished),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some((status, stdout, stderr)) = finished else {
            interrupt(&mut child, &command).await;
            return Err(ProcessError::Interrupted { command });
        };

        let status = status.map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;
        let output = RunOutput {
            code: status.code(),
            stdout,
            stderr,
        };
        if req.check && !status.success() {
            return Err(ProcessError::Failed {
                command,
                code: status.code().unwrap_or(-1),
                stderr_tail: tail(&output.stderr),
            });
        }
        Ok(output)
    }
}

async fn run_to_completion(
    child: &mut Child,
    stdout: Option<impl AsyncRead + Unpin>,
    stderr: Option<impl AsyncRead + Unpin>,
) -> (io::Result<ExitStatus>, String, String) {
    // Drain both pipes while waiting so a chatty child cannot stall on a
    // full pipe buffer.
    let (status, stdout, stderr) = tokio::join!(child.wait(), drain(stdout), drain(stderr));
    (status, stdout, stderr)
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut buf).await;
    }
    buf
}

/// Forward the interrupt, give the child a grace period, then kill it.
async fn interrupt(child: &mut Child, command: &str) {
    debug!(%command, "forwarding interrupt to child");
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGINT);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }
    if tokio::time::timeout(SIGNAL_GRACE, child.wait()).await.is_err() {
        warn!(%command, "child ignored the signal, killing it");
        let _ = child.kill().await;
    }
}

fn tail(stderr: &str) -> Option<String> {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    let mut start = trimmed.len().saturating_sub(STDERR_TAIL);
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    Some(trimmed[start..].to_string())
}
