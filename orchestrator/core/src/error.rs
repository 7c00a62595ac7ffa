// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Top-level error aggregation and process exit codes.
//!
//! Failure policy is fail fast, fail loud: no retries, no rollback of
//! already-applied side effects. Each module surfaces a typed error naming
//! the operation and cause; this type folds them into the exit-code table
//! the CLI reports.

use thiserror::Error;

use crate::certs::CertError;
use crate::dotenv::DotenvError;
use crate::hosts::HostsError;
use crate::propagate::PatchError;
use crate::remote::RemoteError;
use crate::stack::{StackError, StackKind};
use crate::subrepo::SubRepoError;

/// Exit codes shared by both orchestrator modes.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 10;
    pub const CERTIFICATES: i32 = 11;
    pub const SUB_REPO: i32 = 12;
    pub const HOSTS: i32 = 13;
    pub const INFRA_LAUNCH: i32 = 20;
    pub const AI_LAUNCH: i32 = 21;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] DotenvError),
    #[error(transparent)]
    Certificates(#[from] CertError),
    #[error(transparent)]
    SubRepo(#[from] SubRepoError),
    #[error(transparent)]
    Propagate(#[from] PatchError),
    #[error(transparent)]
    Hosts(#[from] HostsError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Stack(#[from] StackError),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        if self.interrupted() {
            return exit::INTERRUPTED;
        }
        match self {
            Error::Config(_) => exit::CONFIG,
            Error::Certificates(_) => exit::CERTIFICATES,
            // Propagation happens inside the sub-repo checkout; its
            // failures share the acquisition code.
            Error::SubRepo(_) | Error::Propagate(_) => exit::SUB_REPO,
            Error::Hosts(_) => exit::HOSTS,
            Error::Remote(RemoteError::Output { .. }) => exit::HOSTS,
            Error::Remote(_) => exit::USAGE,
            // Engine resolution and tear-down fail before any stack is
            // attempted; they share the infra-phase code.
            Error::Stack(StackError::EngineMissing { .. } | StackError::TearDown { .. }) => {
                exit::INFRA_LAUNCH
            }
            Error::Stack(StackError::Launch { kind, .. }) => match kind {
                StackKind::Infra => exit::INFRA_LAUNCH,
                StackKind::Ai => exit::AI_LAUNCH,
            },
        }
    }

    /// An operator interrupt surfaces as 130 no matter which phase the
    /// in-flight child belonged to.
    fn interrupted(&self) -> bool {
        match self {
            Error::Stack(
                StackError::Launch { source, .. } | StackError::TearDown { source },
            ) => source.is_interrupted(),
            Error::SubRepo(SubRepoError::Fetch { source }) => source.is_interrupted(),
            _ => false,
        }
    }
}
