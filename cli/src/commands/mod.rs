//! Subcommand handlers for the `localai` binary.

pub mod launch;
pub mod remote;
