// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `localai launch` — the full reconciliation sequence.
//!
//! Order matters: config before anything that consumes it, certificates and
//! the sub-repo before propagation, hosts last among the prerequisites, and
//! only then the stacks. A hosts-file failure is the one non-fatal step
//! here; the platform still works from the server itself without it.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use clap::{Args, ValueEnum};
use colored::Colorize;
use tracing::{info, warn};

use localai_core::dotenv::{EnvFile, POOLER_TENANT_ID_DEFAULT, POOLER_TENANT_ID_KEY};
use localai_core::error::exit;
use localai_core::process::ProcessRunner;
use localai_core::stack::{self, Profile, Stack};
use localai_core::subrepo::{self, SubRepoSpec};
use localai_core::{certs, hosts, propagate, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    GpuNvidia,
    GpuAmd,
    Cpu,
    None,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::GpuNvidia => Profile::GpuNvidia,
            ProfileArg::GpuAmd => Profile::GpuAmd,
            ProfileArg::Cpu => Profile::Cpu,
            ProfileArg::None => Profile::None,
        }
    }
}

#[derive(Args)]
pub struct LaunchArgs {
    /// Hardware acceleration profile
    #[arg(long, value_enum)]
    pub profile: ProfileArg,

    /// Compose project identity shared by both stacks
    #[arg(long, default_value = stack::DEFAULT_PROJECT)]
    pub project: String,

    /// Seconds to wait between the infrastructure and AI stacks
    #[arg(long, default_value_t = stack::DEFAULT_PAUSE.as_secs())]
    pub wait_secs: u64,
}

/// The platform profile must be expressible on this host.
pub fn validate_profile(profile: Profile) -> Result<(), String> {
    if profile.supported_on_host() {
        Ok(())
    } else {
        Err(format!(
            "profile `{profile}` requires a Linux host (ROCm device passthrough)"
        ))
    }
}

pub async fn run(args: LaunchArgs) -> Result<(), Error> {
    let profile = Profile::from(args.profile);
    if let Err(message) = validate_profile(profile) {
        eprintln!("{} {message}", "error:".red().bold());
        std::process::exit(exit::USAGE);
    }

    // Canonical config: read, self-heal derived keys, persist if changed.
    info!("reconciling configuration");
    let env_path = Path::new(".env");
    let mut env = EnvFile::load(env_path)?;
    if env.ensure_default(
        POOLER_TENANT_ID_KEY,
        POOLER_TENANT_ID_DEFAULT,
        Some("Tenant id the connection pooler scopes its credentials to"),
    ) {
        info!(key = POOLER_TENANT_ID_KEY, value = POOLER_TENANT_ID_DEFAULT, "inserted missing default");
    }
    env.save_if_changed()?;

    info!("ensuring certificate pair");
    certs::ensure_certificates(Path::new("certs"))?;

    info!("ensuring Supabase checkout");
    let runner = ProcessRunner;
    let subrepo_spec = SubRepoSpec::default();
    subrepo::ensure_subrepo(&runner, &subrepo_spec).await?;

    info!("propagating config into sub-stack");
    let docker_dir = subrepo_spec.subtree_dir();
    propagate::copy_env_to_subrepo(env_path, &docker_dir)?;
    propagate::ensure_pooler_port(&docker_dir.join("docker-compose.yml"))?;

    // Best effort: the operator may be running unprivileged, and the
    // platform is still reachable from this machine without the mapping.
    info!("reconciling hosts mapping");
    let hosts_path = hosts::system_hosts_path();
    if let Err(err) = hosts::reconcile(&hosts_path, Ipv4Addr::LOCALHOST) {
        warn!(error = %err, "hosts file not updated; continuing");
    }

    stack::resolve_engine()?;
    let stacks = [Stack::infra(&subrepo_spec.target_dir), Stack::ai()];
    stack::bring_up(
        &runner,
        &args.project,
        &stacks,
        profile,
        Duration::from_secs(args.wait_secs),
    )
    .await?;

    println!();
    println!("{}", "✓ Local AI platform is up".green().bold());
    println!("  project: {}", args.project);
    println!("  profile: {profile}");
    Ok(())
}
