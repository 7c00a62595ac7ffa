// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose stack resolution and launch.
//!
//! Two stacks run under one compose project: the Supabase infrastructure
//! stack and the AI services stack that depends on it. A launch always
//! tears the whole project down first (best effort), then brings the stacks
//! up in order with a coarse pause in between — the infrastructure stack's
//! initializer containers must finish creating the schema before the AI
//! services first connect. No health polling; the pause is an
//! operator-tuned constant.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::process::{CommandRunner, ProcessError, RunRequest};

pub const DEFAULT_PROJECT: &str = "localai";
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(10);

/// Hardware acceleration profile selecting which service variants compose
/// enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    GpuNvidia,
    GpuAmd,
    Cpu,
    /// Baseline services only; no accelerated variant is enabled.
    None,
}

impl Profile {
    /// The `--profile` token, when one applies.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Profile::GpuNvidia => Some("gpu-nvidia"),
            Profile::GpuAmd => Some("gpu-amd"),
            Profile::Cpu => Some("cpu"),
            Profile::None => None,
        }
    }

    /// ROCm device passthrough only exists in compose on Linux hosts.
    pub fn supported_on_host(self) -> bool {
        !matches!(self, Profile::GpuAmd) || cfg!(target_os = "linux")
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag().unwrap_or("none"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Infra,
    Ai,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StackKind::Infra => "infra",
            StackKind::Ai => "ai",
        })
    }
}

/// One compose stack: its file list plus the launch knobs it opts into.
#[derive(Debug, Clone)]
pub struct Stack {
    pub kind: StackKind,
    pub compose_files: Vec<PathBuf>,
    /// Extra compose file included only when it exists on disk.
    pub overlay_if_present: Option<PathBuf>,
    pub supports_profile: bool,
}

impl Stack {
    /// The Supabase sub-stack. It has no accelerated variants, so the
    /// profile flag never applies.
    pub fn infra(subrepo_dir: &Path) -> Self {
        Self {
            kind: StackKind::Infra,
            compose_files: vec![subrepo_dir.join("docker").join("docker-compose.yml")],
            overlay_if_present: None,
            supports_profile: false,
        }
    }

    /// The AI services stack, with the optional host-cache overlay that
    /// re-routes model caches to a host directory.
    pub fn ai() -> Self {
        Self {
            kind: StackKind::Ai,
            compose_files: vec![PathBuf::from("docker-compose.yml")],
            overlay_if_present: Some(PathBuf::from("docker-compose.host-cache.yml")),
            supports_profile: true,
        }
    }

    /// Compose files for this stack, overlay included iff present on disk.
    fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self.compose_files.iter().map(PathBuf::as_path).collect();
        if let Some(overlay) = &self.overlay_if_present {
            if overlay.exists() {
                files.push(overlay);
            }
        }
        files
    }
}

#[derive(Debug, Error)]
pub enum StackError {
    #[error("container engine not found ({source}); install Docker and ensure `docker` is on PATH")]
    EngineMissing {
        #[source]
        source: which::Error,
    },
    #[error("project tear-down failed: {source}")]
    TearDown {
        #[source]
        source: ProcessError,
    },
    #[error("{kind} stack launch failed: {source}")]
    Launch {
        kind: StackKind,
        #[source]
        source: ProcessError,
    },
}

/// Resolve the compose binary before any invocation, so a missing engine
/// fails with one clear message instead of a spawn error mid-sequence.
pub fn resolve_engine() -> Result<PathBuf, StackError> {
    which::which("docker").map_err(|source| StackError::EngineMissing { source })
}

/// Tear the whole project down, then bring each stack up in order, pausing
/// between them. The first launch failure aborts the remaining stacks; the
/// already-running ones are left as they are.
pub async fn bring_up(
    runner: &dyn CommandRunner,
    project: &str,
    stacks: &[Stack],
    profile: Profile,
    pause_between: Duration,
) -> Result<(), StackError> {
    tear_down(runner, project, stacks).await?;
    for (index, stack) in stacks.iter().enumerate() {
        if index > 0 {
            info!(
                seconds = pause_between.as_secs(),
                "waiting for the previous stack's initializers"
            );
            tokio::time::sleep(pause_between).await;
        }
        up(runner, project, stack, profile).await?;
    }
    Ok(())
}

/// One `compose down` over the union of both stacks' files. Idempotent:
/// absent containers produce no error, and a non-zero exit is reported but
/// never blocks the launch.
async fn tear_down(
    runner: &dyn CommandRunner,
    project: &str,
    stacks: &[Stack],
) -> Result<(), StackError> {
    let mut argv = compose_base(project);
    for stack in stacks {
        push_files(&mut argv, &stack.files());
    }
    argv.push("down".into());

    info!(%project, "stopping any previous project containers");
    let request = RunRequest::new(argv)
        .env("DOCKER_BUILDKIT", "1")
        .unchecked();
    match runner.run(request).await {
        Ok(output) if !output.success() => {
            warn!(code = ?output.code, "tear-down exited non-zero; continuing");
            Ok(())
        }
        Ok(_) => Ok(()),
        // Spawn failures and interrupts are not tear-down noise.
        Err(source) => Err(StackError::TearDown { source }),
    }
}

async fn up(
    runner: &dyn CommandRunner,
    project: &str,
    stack: &Stack,
    profile: Profile,
) -> Result<(), StackError> {
    let mut argv = compose_base(project);
    push_files(&mut argv, &stack.files());
    if stack.supports_profile {
        if let Some(flag) = profile.flag() {
            argv.push("--profile".into());
            argv.push(flag.into());
        }
    }
    // --build is unconditional: the custom images use build-kit cache
    // mounts, so a no-op rebuild is cheap and local edits are picked up.
    argv.extend(["up", "-d", "--build"].map(String::from));

    info!(stack = %stack.kind, "bringing stack up");
    let request = RunRequest::new(argv).env("DOCKER_BUILDKIT", "1");
    runner
        .run(request)
        .await
        .map(drop)
        .map_err(|source| StackError::Launch {
            kind: stack.kind,
            source,
        })
}

fn compose_base(project: &str) -> Vec<String> {
    vec![
        "docker".into(),
        "compose".into(),
        "-p".into(),
        project.into(),
    ]
}

fn push_files(argv: &mut Vec<String>, files: &[&Path]) {
    for file in files {
        argv.push("-f".into());
        argv.push(file.display().to_string());
    }
}
