// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the launch pipeline against a recording runner.
//!
//! These verify the compose invocation contract without a container engine:
//! tear-down first over the union file list, infra before ai, profile
//! placement, and abort-on-failure semantics. The sub-repo acquisition
//! command sequences are covered the same way.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use localai_core::process::{CommandRunner, ProcessError, RunOutput, RunRequest};
use localai_core::stack::{self, Profile, Stack, StackError, StackKind};
use localai_core::subrepo::{self, SubRepoSpec};

/// Records every request; optionally fails the invocation at `fail_at`.
struct RecordingRunner {
    calls: Mutex<Vec<RunRequest>>,
    fail_at: Option<usize>,
}

impl RecordingRunner {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_at: None,
        }
    }

    fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<RunRequest> {
        self.calls.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, req: RunRequest) -> Result<RunOutput, ProcessError> {
        let mut calls = self.calls.lock().expect("poisoned");
        let index = calls.len();
        let command = req.display();
        calls.push(req);
        if self.fail_at == Some(index) {
            return Err(ProcessError::Failed {
                command,
                code: 1,
                stderr_tail: Some("service \"db\" has neither an image nor a build context".into()),
            });
        }
        Ok(RunOutput {
            code: Some(0),
            ..RunOutput::default()
        })
    }
}

fn fixture_stacks(dir: &std::path::Path, with_overlay: bool) -> (Vec<Stack>, PathBuf, PathBuf) {
    let subrepo_dir = dir.join("supabase");
    std::fs::create_dir_all(subrepo_dir.join("docker")).expect("mkdir");
    let infra_compose = subrepo_dir.join("docker").join("docker-compose.yml");
    std::fs::write(&infra_compose, "services: {}\n").expect("infra compose");

    let ai_compose = dir.join("docker-compose.yml");
    std::fs::write(&ai_compose, "services: {}\n").expect("ai compose");
    let overlay = dir.join("docker-compose.host-cache.yml");
    if with_overlay {
        std::fs::write(&overlay, "services: {}\n").expect("overlay");
    }

    let infra = Stack::infra(&subrepo_dir);
    let mut ai = Stack::ai();
    ai.compose_files = vec![ai_compose.clone()];
    ai.overlay_if_present = Some(overlay);
    (vec![infra, ai], infra_compose, ai_compose)
}

#[tokio::test]
async fn launch_tears_down_then_starts_stacks_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, infra_compose, ai_compose) = fixture_stacks(dir.path(), false);
    let runner = RecordingRunner::new();

    stack::bring_up(&runner, "localai", &stacks, Profile::GpuNvidia, Duration::ZERO)
        .await
        .expect("bring up");

    let calls = runner.calls();
    assert_eq!(calls.len(), 3);

    // Tear-down first, over the union of both stacks' compose files.
    let down = &calls[0].argv;
    assert_eq!(&down[..4], &["docker", "compose", "-p", "localai"]);
    assert_eq!(down.last().map(String::as_str), Some("down"));
    let infra_pos = down
        .iter()
        .position(|arg| arg == &infra_compose.display().to_string())
        .expect("infra file in down");
    let ai_pos = down
        .iter()
        .position(|arg| arg == &ai_compose.display().to_string())
        .expect("ai file in down");
    assert!(infra_pos < ai_pos);
    assert!(!calls[0].check, "tear-down is best effort");

    // Infra up, then ai up, both detached builds under the shared project.
    for call in &calls[1..] {
        assert_eq!(&call.argv[..4], &["docker", "compose", "-p", "localai"]);
        assert_eq!(&call.argv[call.argv.len() - 3..], &["up", "-d", "--build"]);
        assert_eq!(
            call.env.get("DOCKER_BUILDKIT").map(String::as_str),
            Some("1")
        );
    }
    assert!(calls[1]
        .argv
        .contains(&infra_compose.display().to_string()));
    assert!(calls[2].argv.contains(&ai_compose.display().to_string()));
}

#[tokio::test]
async fn profile_flag_reaches_only_the_ai_stack() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, _, _) = fixture_stacks(dir.path(), false);
    let runner = RecordingRunner::new();

    stack::bring_up(&runner, "localai", &stacks, Profile::GpuNvidia, Duration::ZERO)
        .await
        .expect("bring up");

    let calls = runner.calls();
    assert!(!calls[1].argv.contains(&"--profile".to_string()));
    let ai = &calls[2].argv;
    let flag = ai.iter().position(|arg| arg == "--profile").expect("flag");
    assert_eq!(ai[flag + 1], "gpu-nvidia");
}

#[tokio::test]
async fn profile_none_adds_no_flag_anywhere() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, _, _) = fixture_stacks(dir.path(), false);
    let runner = RecordingRunner::new();

    stack::bring_up(&runner, "localai", &stacks, Profile::None, Duration::ZERO)
        .await
        .expect("bring up");

    for call in runner.calls() {
        assert!(!call.argv.contains(&"--profile".to_string()));
    }
}

#[tokio::test]
async fn host_cache_overlay_joins_the_ai_file_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, _, _) = fixture_stacks(dir.path(), true);
    let overlay = dir.path().join("docker-compose.host-cache.yml");
    let runner = RecordingRunner::new();

    stack::bring_up(&runner, "localai", &stacks, Profile::Cpu, Duration::ZERO)
        .await
        .expect("bring up");

    let calls = runner.calls();
    let overlay_arg = overlay.display().to_string();
    assert!(calls[0].argv.contains(&overlay_arg), "overlay in tear-down");
    assert!(!calls[1].argv.contains(&overlay_arg), "not in infra up");
    assert!(calls[2].argv.contains(&overlay_arg), "overlay in ai up");
}

#[tokio::test]
async fn infra_failure_aborts_before_the_ai_stack() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, _, _) = fixture_stacks(dir.path(), false);
    // Call 0 is the tear-down; call 1 is the infra `up`.
    let runner = RecordingRunner::failing_at(1);

    let err = stack::bring_up(&runner, "localai", &stacks, Profile::Cpu, Duration::ZERO)
        .await
        .expect_err("must fail");

    match err {
        StackError::Launch { kind, .. } => assert_eq!(kind, StackKind::Infra),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(runner.calls().len(), 2, "ai stack never invoked");
}

#[tokio::test]
async fn tear_down_runner_error_is_named_as_tear_down() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, _, _) = fixture_stacks(dir.path(), false);
    // Call 0 is the tear-down; the fake's error stands in for a spawn
    // failure or interrupt, the only errors an unchecked run can surface.
    let runner = RecordingRunner::failing_at(0);

    let err = stack::bring_up(&runner, "localai", &stacks, Profile::Cpu, Duration::ZERO)
        .await
        .expect_err("must fail");

    assert!(matches!(err, StackError::TearDown { .. }));
    assert!(err.to_string().contains("tear-down"));
    assert_eq!(runner.calls().len(), 1, "no stack is attempted");
}

#[tokio::test]
async fn tear_down_failure_is_tolerated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stacks, _, _) = fixture_stacks(dir.path(), false);
    // `down` exits non-zero but check=false, so only a checked `up`
    // failure can abort; fail nothing and assert the pipeline ran fully.
    let runner = RecordingRunner::new();

    stack::bring_up(&runner, "localai", &stacks, Profile::Cpu, Duration::ZERO)
        .await
        .expect("bring up");
    assert_eq!(runner.calls().len(), 3);
}

#[tokio::test]
async fn fresh_subrepo_is_cloned_sparse_and_pinned() {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = SubRepoSpec {
        target_dir: dir.path().join("supabase"),
        ..SubRepoSpec::default()
    };
    let runner = RecordingRunner::new();

    subrepo::ensure_subrepo(&runner, &spec).await.expect("acquire");

    let calls = runner.calls();
    let argvs: Vec<Vec<String>> = calls.iter().map(|c| c.argv.clone()).collect();
    assert_eq!(argvs.len(), 4);
    let target = spec.target_dir.display().to_string();
    assert_eq!(
        argvs[0],
        [
            "git",
            "clone",
            "--filter=blob:none",
            "--no-checkout",
            subrepo::SUPABASE_REPO_URL,
            target.as_str(),
        ]
    );
    assert_eq!(argvs[1], vec!["git", "sparse-checkout", "init", "--cone"]);
    assert_eq!(argvs[2], vec!["git", "sparse-checkout", "set", "docker"]);
    assert_eq!(argvs[3], vec!["git", "checkout", "master"]);
    // The follow-up commands run inside the checkout.
    for call in &calls[1..] {
        assert_eq!(call.cwd.as_deref(), Some(spec.target_dir.as_path()));
    }
}

#[tokio::test]
async fn existing_subrepo_is_fetched_and_hard_reset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = SubRepoSpec {
        target_dir: dir.path().join("supabase"),
        ..SubRepoSpec::default()
    };
    std::fs::create_dir_all(spec.target_dir.join(".git")).expect("fake checkout");
    let runner = RecordingRunner::new();

    subrepo::ensure_subrepo(&runner, &spec).await.expect("refresh");

    let argvs: Vec<Vec<String>> = runner.calls().iter().map(|c| c.argv.clone()).collect();
    assert_eq!(
        argvs,
        vec![
            vec!["git", "fetch", "--depth", "1", "origin", "master"],
            vec!["git", "reset", "--hard", "FETCH_HEAD"],
        ]
    );
}
