// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hosts-file reconciliation.
//!
//! The orchestrator owns exactly one sentinel-delimited block in the host's
//! name resolution file and replaces it wholesale on every run. Everything
//! outside the sentinels is preserved byte for byte, in original order.

use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::fsutil;

pub const BLOCK_BEGIN: &str = "# >>> local-ai-packaged";
pub const BLOCK_END: &str = "# <<< local-ai-packaged";

/// Every service hostname Traefik routes, sorted. The block renders them in
/// this order so reconciliation output is deterministic.
const CANONICAL_HOSTNAMES: [&str; 14] = [
    "comfyui.lan",
    "crawl4ai.lan",
    "flowise.lan",
    "kokoro.lan",
    "lmstudio.lan",
    "n8n.lan",
    "nocodb.lan",
    "openwebui.lan",
    "qdrant.lan",
    "raven.lan",
    "studio.lan",
    "traefik.lan",
    "va.lan",
    "whisper.lan",
];

pub fn canonical_hostnames() -> &'static [&'static str] {
    &CANONICAL_HOSTNAMES
}

#[derive(Debug, Error)]
pub enum HostsError {
    #[error(
        "{}: unbalanced local-ai-packaged sentinel markers; remove the stray `# >>>`/`# <<<` lines and rerun",
        .path.display()
    )]
    Corrupt { path: PathBuf },
    #[error(
        "{} is not writable ({source}); rerun with elevated privileges (sudo on POSIX, an administrator shell on Windows)",
        .path.display()
    )]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to update {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Platform location of the name resolution file.
pub fn system_hosts_path() -> PathBuf {
    if cfg!(windows) {
        let root = std::env::var_os("SystemRoot").unwrap_or_else(|| "C:\\Windows".into());
        PathBuf::from(root).join("System32\\drivers\\etc\\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

/// The sentinel block mapping every canonical hostname to `address`.
pub fn render_block(address: Ipv4Addr) -> String {
    let mut block = String::new();
    block.push_str(BLOCK_BEGIN);
    block.push('\n');
    for host in CANONICAL_HOSTNAMES {
        block.push_str(&format!("{address}\t{host}\n"));
    }
    block.push_str(BLOCK_END);
    block.push('\n');
    block
}

/// Ensure the file contains exactly one sentinel block mapping every
/// canonical hostname to `address`. A missing file counts as empty; a write
/// is only issued when the reconciled content differs.
pub fn reconcile(hosts_path: &Path, address: Ipv4Addr) -> Result<(), HostsError> {
    let current = match fsutil::read_text(hosts_path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(classify_io(hosts_path, source));
        }
    };

    let mut next = excise_block(&current, hosts_path)?;
    if !next.is_empty() && !next.ends_with('\n') {
        next.push('\n');
    }
    next.push_str(&render_block(address));

    if next == current {
        return Ok(());
    }
    fsutil::replace_atomically(hosts_path, &next)
        .map_err(|source| classify_io(hosts_path, source))?;
    info!(path = %hosts_path.display(), %address, "reconciled hosts mapping block");
    Ok(())
}

fn classify_io(path: &Path, source: io::Error) -> HostsError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        HostsError::Unwritable {
            path: path.to_path_buf(),
            source,
        }
    } else {
        HostsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Content with any existing sentinel block removed. More than one block,
/// or an unpaired marker, refuses reconciliation outright.
fn excise_block(content: &str, path: &Path) -> Result<String, HostsError> {
    let corrupt = || HostsError::Corrupt {
        path: path.to_path_buf(),
    };
    let mut kept = String::new();
    let mut in_block = false;
    let mut seen_block = false;
    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']).trim();
        if body == BLOCK_BEGIN {
            if in_block || seen_block {
                return Err(corrupt());
            }
            in_block = true;
            seen_block = true;
        } else if body == BLOCK_END {
            if !in_block {
                return Err(corrupt());
            }
            in_block = false;
        } else if !in_block {
            kept.push_str(line);
        }
    }
    if in_block {
        return Err(corrupt());
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciled(seed: Option<&str>) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hosts");
        if let Some(content) = seed {
            std::fs::write(&path, content).expect("seed");
        }
        (dir, path)
    }

    #[test]
    fn fresh_file_gets_a_single_block() {
        let (_dir, path) = reconciled(None);
        reconcile(&path, Ipv4Addr::LOCALHOST).expect("reconcile");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.starts_with(BLOCK_BEGIN));
        assert!(content.ends_with(&format!("{BLOCK_END}\n")));
        assert_eq!(content.matches(BLOCK_BEGIN).count(), 1);
        assert_eq!(content.matches("127.0.0.1\t").count(), 14);
        assert!(content.contains("127.0.0.1\tn8n.lan\n"));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let (_dir, path) = reconciled(Some("127.0.0.1 localhost\n"));
        reconcile(&path, Ipv4Addr::LOCALHOST).expect("first");
        let first = std::fs::read_to_string(&path).expect("read");
        reconcile(&path, Ipv4Addr::LOCALHOST).expect("second");
        let second = std::fs::read_to_string(&path).expect("read");
        assert_eq!(first, second);
    }

    #[test]
    fn foreign_content_survives_in_order() {
        let seed = "127.0.0.1 localhost\n# operator note\n10.0.0.7 nas.local\n";
        let (_dir, path) = reconciled(Some(seed));
        reconcile(&path, Ipv4Addr::LOCALHOST).expect("reconcile");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.starts_with(seed));
    }

    #[test]
    fn stale_block_is_replaced_wholesale() {
        let seed = format!(
            "127.0.0.1 localhost\n{BLOCK_BEGIN}\n10.1.1.1\tgone.lan\n{BLOCK_END}\ntrailing line\n"
        );
        let (_dir, path) = reconciled(Some(&seed));
        let server = Ipv4Addr::new(192, 168, 3, 34);
        reconcile(&path, server).expect("reconcile");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(!content.contains("gone.lan"));
        assert!(content.starts_with("127.0.0.1 localhost\ntrailing line\n"));
        assert_eq!(content.matches(BLOCK_BEGIN).count(), 1);
        assert!(content.contains("192.168.3.34\tstudio.lan\n"));
    }

    #[test]
    fn file_without_final_newline_is_separated_from_the_block() {
        let (_dir, path) = reconciled(Some("127.0.0.1 localhost"));
        reconcile(&path, Ipv4Addr::LOCALHOST).expect("reconcile");
        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.starts_with(&format!("127.0.0.1 localhost\n{BLOCK_BEGIN}\n")));
    }

    #[test]
    fn unpaired_begin_marker_is_corrupt() {
        let (_dir, path) = reconciled(Some(&format!("{BLOCK_BEGIN}\n127.0.0.1\tn8n.lan\n")));
        let err = reconcile(&path, Ipv4Addr::LOCALHOST).expect_err("must fail");
        assert!(matches!(err, HostsError::Corrupt { .. }));
    }

    #[test]
    fn end_marker_before_begin_is_corrupt() {
        let (_dir, path) = reconciled(Some(&format!("{BLOCK_END}\n")));
        let err = reconcile(&path, Ipv4Addr::LOCALHOST).expect_err("must fail");
        assert!(matches!(err, HostsError::Corrupt { .. }));
    }

    #[test]
    fn two_blocks_are_corrupt() {
        let seed = format!("{BLOCK_BEGIN}\n{BLOCK_END}\n{BLOCK_BEGIN}\n{BLOCK_END}\n");
        let (_dir, path) = reconciled(Some(&seed));
        let err = reconcile(&path, Ipv4Addr::LOCALHOST).expect_err("must fail");
        assert!(matches!(err, HostsError::Corrupt { .. }));
    }
}
