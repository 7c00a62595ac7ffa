// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `localai plan-remote-access` — render (and optionally apply) the
//! material other machines need to reach the platform.
//!
//! The default run only prints; `--update-local` reconciles this machine's
//! hosts file against the server address, which is the one mode where a
//! hosts failure is fatal.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use tracing::info;

use localai_core::remote::{self, RemoteAccessPlan, RemoteError};
use localai_core::{fsutil, hosts, Error};

const HOSTS_FRAGMENT_FILE: &str = "hosts-fragment.txt";
const DNS_ZONE_FILE: &str = "dns-zone.txt";

#[derive(Args)]
pub struct PlanArgs {
    /// IPv4 address other machines reach this server at (default: auto-detect)
    #[arg(long, value_name = "ADDR")]
    pub server_address: Option<Ipv4Addr>,

    /// Also emit an authoritative DNS zone fragment
    #[arg(long)]
    pub dns: bool,

    /// Apply the mapping to this machine's hosts file
    #[arg(long)]
    pub update_local: bool,

    /// Directory to also write the fragments into
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

pub async fn run(args: PlanArgs) -> Result<(), Error> {
    let address = match args.server_address {
        Some(address) => address,
        None => {
            let detected = remote::detect_server_address()?;
            info!(%detected, "auto-detected server address");
            detected
        }
    };
    let plan = RemoteAccessPlan::new(address);

    println!("# Hosts entries for the Local AI platform at {address}");
    print!("{}", plan.hosts_fragment());
    println!();
    println!("{}", plan.posix_instructions());
    println!();
    println!("{}", plan.windows_instructions());

    if args.dns {
        println!();
        println!("# Authoritative records");
        print!("{}", plan.dns_zone_fragment());
        println!();
        println!("{}", plan.dns_instructions());
    }

    if let Some(dir) = &args.output {
        write_fragment(dir, HOSTS_FRAGMENT_FILE, &plan.hosts_fragment())?;
        if args.dns {
            write_fragment(dir, DNS_ZONE_FILE, &plan.dns_zone_fragment())?;
        }
        println!();
        println!("{}", format!("✓ fragments written to {}", dir.display()).green());
    }

    if args.update_local {
        let hosts_path = hosts::system_hosts_path();
        hosts::reconcile(&hosts_path, address)?;
        println!();
        println!("{}", format!("✓ {} updated", hosts_path.display()).green());
    }

    Ok(())
}

fn write_fragment(dir: &std::path::Path, name: &str, content: &str) -> Result<(), Error> {
    let to_output_error = |source: std::io::Error| {
        Error::from(RemoteError::Output {
            path: dir.join(name).display().to_string(),
            source,
        })
    };
    fsutil::ensure_dir(dir).map_err(to_output_error)?;
    fsutil::write_text(&dir.join(name), content).map_err(to_output_error)?;
    Ok(())
}
