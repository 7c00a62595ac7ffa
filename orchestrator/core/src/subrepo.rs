// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pinned Supabase checkout.
//!
//! The infrastructure stack's compose file ships in the upstream Supabase
//! repository; only its `docker/` subtree is materialized, blobless, and an
//! existing checkout is pinned by fetch + hard reset rather than merged.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::process::{CommandRunner, ProcessError, RunRequest};

pub const SUPABASE_REPO_URL: &str = "https://github.com/supabase/supabase.git";
pub const SUPABASE_DIR: &str = "supabase";
pub const SUPABASE_SUBTREE: &str = "docker";
pub const SUPABASE_REF: &str = "master";

#[derive(Debug, Clone)]
pub struct SubRepoSpec {
    pub url: String,
    pub target_dir: PathBuf,
    pub subtree: String,
    pub git_ref: String,
}

impl Default for SubRepoSpec {
    fn default() -> Self {
        Self {
            url: SUPABASE_REPO_URL.to_string(),
            target_dir: PathBuf::from(SUPABASE_DIR),
            subtree: SUPABASE_SUBTREE.to_string(),
            git_ref: SUPABASE_REF.to_string(),
        }
    }
}

impl SubRepoSpec {
    /// Directory holding the sub-stack's compose material.
    pub fn subtree_dir(&self) -> PathBuf {
        self.target_dir.join(&self.subtree)
    }
}

#[derive(Debug, Error)]
pub enum SubRepoError {
    #[error("ref `{git_ref}` not found in {url}")]
    RefNotFound { url: String, git_ref: String },
    #[error("sub-repository acquisition failed: {source}")]
    Fetch {
        #[source]
        source: ProcessError,
    },
}

/// Ensure the pinned checkout exists and matches `spec.git_ref`. Both paths
/// end with `target_dir/subtree` present in the working tree.
pub async fn ensure_subrepo(
    runner: &dyn CommandRunner,
    spec: &SubRepoSpec,
) -> Result<(), SubRepoError> {
    if spec.target_dir.join(".git").exists() {
        update(runner, spec).await
    } else {
        clone(runner, spec).await
    }
}

async fn update(runner: &dyn CommandRunner, spec: &SubRepoSpec) -> Result<(), SubRepoError> {
    info!(
        dir = %spec.target_dir.display(),
        pinned = %spec.git_ref,
        "updating existing checkout"
    );
    git(
        runner,
        spec,
        &["fetch", "--depth", "1", "origin", &spec.git_ref],
    )
    .await?;
    // Never merge; the checkout tracks the pinned ref exactly.
    git(runner, spec, &["reset", "--hard", "FETCH_HEAD"]).await
}

async fn clone(runner: &dyn CommandRunner, spec: &SubRepoSpec) -> Result<(), SubRepoError> {
    info!(
        url = %spec.url,
        dir = %spec.target_dir.display(),
        subtree = %spec.subtree,
        "cloning sub-repository"
    );
    let request = RunRequest::new(vec![
        "git".to_string(),
        "clone".to_string(),
        "--filter=blob:none".to_string(),
        "--no-checkout".to_string(),
        spec.url.clone(),
        spec.target_dir.display().to_string(),
    ])
    .captured();
    runner.run(request).await.map_err(|err| classify(err, spec))?;

    git(runner, spec, &["sparse-checkout", "init", "--cone"]).await?;
    git(runner, spec, &["sparse-checkout", "set", &spec.subtree]).await?;
    git(runner, spec, &["checkout", &spec.git_ref]).await
}

async fn git(
    runner: &dyn CommandRunner,
    spec: &SubRepoSpec,
    args: &[&str],
) -> Result<(), SubRepoError> {
    let mut argv = vec!["git".to_string()];
    argv.extend(args.iter().map(ToString::to_string));
    let request = RunRequest::new(argv).cwd(&spec.target_dir).captured();
    runner
        .run(request)
        .await
        .map(drop)
        .map_err(|err| classify(err, spec))
}

fn classify(err: ProcessError, spec: &SubRepoSpec) -> SubRepoError {
    if let ProcessError::Failed {
        stderr_tail: Some(tail),
        ..
    } = &err
    {
        let tail = tail.to_lowercase();
        if tail.contains("couldn't find remote ref")
            || tail.contains("did not match any file(s) known to git")
            || tail.contains("unknown revision")
        {
            return SubRepoError::RefNotFound {
                url: spec.url.clone(),
                git_ref: spec.git_ref.clone(),
            };
        }
    }
    SubRepoError::Fetch { source: err }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_not_found_is_classified_from_stderr() {
        let spec = SubRepoSpec::default();
        let err = ProcessError::Failed {
            command: "git fetch --depth 1 origin master".into(),
            code: 128,
            stderr_tail: Some("fatal: couldn't find remote ref nightly".into()),
        };
        assert!(matches!(
            classify(err, &spec),
            SubRepoError::RefNotFound { .. }
        ));
    }

    #[test]
    fn other_failures_stay_fetch_errors() {
        let spec = SubRepoSpec::default();
        let err = ProcessError::Failed {
            command: "git clone".into(),
            code: 128,
            stderr_tail: Some("fatal: unable to access: connection refused".into()),
        };
        assert!(matches!(classify(err, &spec), SubRepoError::Fetch { .. }));
    }
}
