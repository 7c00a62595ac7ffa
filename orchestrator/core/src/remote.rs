// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote access planning.
//!
//! Pure computation: given the address other machines reach this server at,
//! render the material an operator needs to resolve the platform hostnames
//! from elsewhere on the LAN — a hosts-file fragment, an authoritative DNS
//! zone fragment, and per-platform instructions. Nothing here performs
//! network I/O; the only host inspection is enumerating local interfaces to
//! propose a default address.

use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

use crate::hosts;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no non-loopback IPv4 interface found; pass --server-address explicitly")]
    NoAddress,
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[from] local_ip_address::Error),
    #[error("failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything `plan-remote-access` renders, fixed by `(address, hostnames)`.
#[derive(Debug, Clone)]
pub struct RemoteAccessPlan {
    pub server_address: Ipv4Addr,
    hostnames: Vec<&'static str>,
}

impl RemoteAccessPlan {
    pub fn new(server_address: Ipv4Addr) -> Self {
        let mut hostnames = hosts::canonical_hostnames().to_vec();
        hostnames.sort_unstable();
        Self {
            server_address,
            hostnames,
        }
    }

    /// `<address>\t<hostname>` lines, sorted by hostname, trailing newline.
    /// Valid verbatim in both POSIX and Windows hosts files.
    pub fn hosts_fragment(&self) -> String {
        let mut out = String::new();
        for host in &self.hostnames {
            out.push_str(&format!("{}\t{host}\n", self.server_address));
        }
        out
    }

    /// Authoritative A records, one per hostname. Each line stands alone,
    /// so any resolver that loads independent records can consume it.
    pub fn dns_zone_fragment(&self) -> String {
        let mut out = String::new();
        for host in &self.hostnames {
            out.push_str(&format!("{host}. IN A {}\n", self.server_address));
        }
        out
    }

    pub fn posix_instructions(&self) -> &'static str {
        "POSIX clients: append the fragment above to /etc/hosts (root required):\n\
         \x20 sudo sh -c 'cat >> /etc/hosts'"
    }

    pub fn windows_instructions(&self) -> &'static str {
        "Windows clients: append the same fragment to\n\
         \x20 %SystemRoot%\\System32\\drivers\\etc\\hosts\n\
         from an elevated (administrator) editor."
    }

    pub fn dns_instructions(&self) -> &'static str {
        "DNS server: load the A records above into the zone your LAN\n\
         resolver serves; each line is an independent record."
    }
}

/// Propose the server address: the first non-loopback IPv4 bound to an up
/// interface, interfaces ordered by name so the proposal is deterministic.
pub fn detect_server_address() -> Result<Ipv4Addr, RemoteError> {
    let mut interfaces = local_ip_address::list_afinet_netifas()?;
    interfaces.sort_by(|a, b| a.0.cmp(&b.0));
    for (_name, address) in interfaces {
        if let IpAddr::V4(v4) = address {
            if !v4.is_loopback() {
                return Ok(v4);
            }
        }
    }
    Err(RemoteError::NoAddress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_fragment_is_sorted_and_complete() {
        let plan = RemoteAccessPlan::new(Ipv4Addr::new(192, 168, 3, 34));
        let fragment = plan.hosts_fragment();
        let lines: Vec<&str> = fragment.lines().collect();

        assert_eq!(lines.len(), 14);
        assert_eq!(lines[0], "192.168.3.34\tcomfyui.lan");
        assert_eq!(lines[13], "192.168.3.34\twhisper.lan");
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        assert_eq!(lines, sorted);
        assert!(fragment.ends_with('\n'));
    }

    #[test]
    fn dns_fragment_renders_independent_a_records() {
        let plan = RemoteAccessPlan::new(Ipv4Addr::new(192, 168, 3, 34));
        let fragment = plan.dns_zone_fragment();

        assert_eq!(fragment.lines().count(), 14);
        assert!(fragment.contains("n8n.lan. IN A 192.168.3.34\n"));
        assert!(fragment.contains("studio.lan. IN A 192.168.3.34\n"));
    }

    #[test]
    fn plans_are_deterministic() {
        let address = Ipv4Addr::new(10, 0, 0, 2);
        let first = RemoteAccessPlan::new(address);
        let second = RemoteAccessPlan::new(address);
        assert_eq!(first.hosts_fragment(), second.hosts_fragment());
        assert_eq!(first.dns_zone_fragment(), second.dns_zone_fragment());
    }
}
