// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Propagation of the canonical config into the Supabase sub-stack.
//!
//! The sub-stack reads its own `docker/.env`, so the operator's file is
//! copied over verbatim on every run. Upstream also keeps the connection
//! pooler internal to its network; the AI stack's services dial it from
//! sibling containers, so its port must be published. The patch edits the
//! sub-stack compose document in place, preserving every key it does not
//! understand.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::info;

use crate::fsutil;

/// Upstream's service key for the connection pooler.
pub const POOLER_SERVICE: &str = "supavisor";
/// Transaction-mode pooler port the AI stack dials.
pub const POOLER_PORT: u16 = 6543;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{}: no `{POOLER_SERVICE}` service to patch", .path.display())]
    MissingService { path: PathBuf },
    #[error("{}: `{POOLER_SERVICE}` has a malformed ports list", .path.display())]
    MalformedPorts { path: PathBuf },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Copy the canonical config into the sub-stack's expected location,
/// overwriting any prior copy. `fs::copy` mirrors the source permissions.
pub fn copy_env_to_subrepo(env_path: &Path, subrepo_docker_dir: &Path) -> Result<(), PatchError> {
    let dest = subrepo_docker_dir.join(".env");
    fs::copy(env_path, &dest).map_err(|source| PatchError::Copy {
        from: env_path.to_path_buf(),
        to: dest.clone(),
        source,
    })?;
    info!(to = %dest.display(), "propagated canonical config into sub-stack");
    Ok(())
}

/// Ensure the pooler service publishes its port. Returns true iff the file
/// was rewritten; an already-published port is a no-op.
pub fn ensure_pooler_port(compose_path: &Path) -> Result<bool, PatchError> {
    let text = fsutil::read_text(compose_path).map_err(|source| PatchError::Read {
        path: compose_path.to_path_buf(),
        source,
    })?;
    let mut doc: Value = serde_yaml::from_str(&text).map_err(|source| PatchError::Parse {
        path: compose_path.to_path_buf(),
        source,
    })?;

    let service = doc
        .get_mut("services")
        .and_then(|services| services.get_mut(POOLER_SERVICE))
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| PatchError::MissingService {
            path: compose_path.to_path_buf(),
        })?;

    let ports = service
        .entry(Value::String("ports".into()))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    // A bare `ports:` key parses as null; treat it like an absent list.
    if matches!(ports, Value::Null) {
        *ports = Value::Sequence(Vec::new());
    }
    let Value::Sequence(ports) = ports else {
        return Err(PatchError::MalformedPorts {
            path: compose_path.to_path_buf(),
        });
    };

    if ports.iter().any(publishes_pooler_port) {
        return Ok(false);
    }
    ports.push(Value::String(format!("{POOLER_PORT}:{POOLER_PORT}")));

    let rendered = serde_yaml::to_string(&doc).map_err(|source| PatchError::Parse {
        path: compose_path.to_path_buf(),
        source,
    })?;
    fsutil::replace_atomically(compose_path, &rendered).map_err(|source| PatchError::Write {
        path: compose_path.to_path_buf(),
        source,
    })?;
    info!(path = %compose_path.display(), port = POOLER_PORT, "published pooler port");
    Ok(true)
}

/// Matches both the short `"6543:6543"` form and the long mapping form.
fn publishes_pooler_port(entry: &Value) -> bool {
    let short = format!("{POOLER_PORT}:{POOLER_PORT}");
    match entry {
        Value::String(spec) => spec == &short || spec == &format!("{short}/tcp"),
        Value::Mapping(mapping) => {
            is_pooler_port(mapping.get(&Value::from("target")))
                && is_pooler_port(mapping.get(&Value::from("published")))
        }
        _ => false,
    }
}

fn is_pooler_port(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_u64() == Some(u64::from(POOLER_PORT)),
        Some(Value::String(s)) => s == &POOLER_PORT.to_string(),
        _ => false,
    }
}
