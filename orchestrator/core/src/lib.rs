// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Local AI Platform Orchestrator — core
//!
//! The orchestrator is a one-shot reconciler for a self-hosted "Local AI"
//! platform: it normalizes the operator's `.env`, materializes on-disk
//! prerequisites (wildcard certificate, hosts mappings, the pinned Supabase
//! checkout) and brings the two compose stacks up in order under a single
//! project identity. Each invocation runs the full sequence and exits; there
//! is no daemon and no internal parallelism.
//!
//! Modules map one-to-one onto those concerns:
//!
//! - [`process`] — argv-array subprocess execution behind a mockable trait
//! - [`fsutil`] — idempotent directory creation and atomic file replacement
//! - [`dotenv`] — round-trip preserving `.env` store
//! - [`certs`] — self-signed wildcard certificate provisioning
//! - [`hosts`] — sentinel-delimited hosts-file reconciliation
//! - [`subrepo`] — pinned sparse checkout of the Supabase sub-stack
//! - [`propagate`] — config copy and compose patch inside the sub-stack
//! - [`stack`] — compose invocation planning and ordered launch
//! - [`remote`] — LAN remote-access planning (pure computation)
//!
//! The `cli` crate owns the command surface and wires these together.

pub mod certs;
pub mod dotenv;
pub mod error;
pub mod fsutil;
pub mod hosts;
pub mod process;
pub mod propagate;
pub mod remote;
pub mod stack;
pub mod subrepo;

pub use error::Error;
