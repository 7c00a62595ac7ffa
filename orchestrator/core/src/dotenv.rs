// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Round-trip preserving `.env` store.
//!
//! The operator owns this file; the orchestrator reads it on every run and
//! writes it only to insert a missing derived key. Loading keeps every
//! comment, blank line and assignment in order with its raw source line
//! (terminator included), so serialization is byte-stable modulo explicit
//! edits and the operator's layout survives reviewably.
//!
//! Quoting is not interpreted: the value of `KEY="x" # note` is the raw text
//! `"x" # note`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::fsutil;

/// Tenant id the Supabase connection pooler scopes its upstream database
/// credentials to. Inserted when the operator's file lacks it.
pub const POOLER_TENANT_ID_KEY: &str = "POOLER_TENANT_ID";
pub const POOLER_TENANT_ID_DEFAULT: &str = "1000";

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=").expect("assignment grammar"));

#[derive(Debug, Error)]
pub enum DotenvError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}:{line}: not a comment, blank line or KEY=VALUE assignment", .path.display())]
    Parse { path: PathBuf, line: usize },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One source line. `raw` always carries the verbatim text including its
/// terminator, which makes serialization a plain concatenation.
#[derive(Debug, Clone)]
enum Entry {
    Comment { raw: String },
    Blank { raw: String },
    Assignment {
        key: String,
        value: String,
        raw: String,
    },
}

impl Entry {
    fn raw(&self) -> &str {
        match self {
            Entry::Comment { raw } | Entry::Blank { raw } | Entry::Assignment { raw, .. } => raw,
        }
    }
}

/// The operator's configuration file, held as an ordered entry sequence.
#[derive(Debug)]
pub struct EnvFile {
    path: PathBuf,
    entries: Vec<Entry>,
    /// Terminator used for appended lines: the file's own if it has one.
    newline: &'static str,
    dirty: bool,
}

impl EnvFile {
    pub fn load(path: &Path) -> Result<Self, DotenvError> {
        let content = fsutil::read_text(path).map_err(|source| DotenvError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, DotenvError> {
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        let mut entries = Vec::new();
        for (index, line) in content.split_inclusive('\n').enumerate() {
            let body = line_body(line);
            let entry = if body.trim().is_empty() {
                Entry::Blank { raw: line.to_string() }
            } else if body.trim_start().starts_with('#') {
                Entry::Comment { raw: line.to_string() }
            } else if let Some(caps) = ASSIGNMENT.captures(body) {
                let key = caps[1].to_string();
                let value = body[caps.get(0).map_or(0, |m| m.end())..].to_string();
                Entry::Assignment {
                    key,
                    value,
                    raw: line.to_string(),
                }
            } else {
                return Err(DotenvError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                });
            };
            entries.push(entry);
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            newline,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Assignment {
                key: existing,
                value,
                ..
            } if existing == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Re-sets `key` in place if present, appends otherwise. Returns true
    /// iff the file contents changed.
    pub fn set(&mut self, key: &str, value: &str, leading_comment: Option<&str>) -> bool {
        for entry in &mut self.entries {
            if let Entry::Assignment {
                key: existing,
                value: current,
                raw,
            } = entry
            {
                if existing != key {
                    continue;
                }
                if current == value {
                    return false;
                }
                let terminator = raw[line_body(raw).len()..].to_string();
                *raw = format!("{key}={value}{terminator}");
                *current = value.to_string();
                self.dirty = true;
                return true;
            }
        }
        self.append(key, value, leading_comment);
        true
    }

    /// No-op when `key` is present, append with an optional leading comment
    /// otherwise. Returns true iff the file contents changed.
    pub fn ensure_default(
        &mut self,
        key: &str,
        default: &str,
        leading_comment: Option<&str>,
    ) -> bool {
        if self.get(key).is_some() {
            return false;
        }
        self.append(key, default, leading_comment);
        true
    }

    fn append(&mut self, key: &str, value: &str, leading_comment: Option<&str>) {
        // A final line without terminator gets one so the appended entry
        // starts on its own line.
        if let Some(last) = self.entries.last_mut() {
            if !last.raw().ends_with('\n') {
                let terminated = format!("{}{}", last.raw(), self.newline);
                match last {
                    Entry::Comment { raw } | Entry::Blank { raw } | Entry::Assignment { raw, .. } => {
                        *raw = terminated;
                    }
                }
            }
        }
        if let Some(comment) = leading_comment {
            self.entries.push(Entry::Comment {
                raw: format!("# {comment}{}", self.newline),
            });
        }
        self.entries.push(Entry::Assignment {
            key: key.to_string(),
            value: value.to_string(),
            raw: format!("{key}={value}{}", self.newline),
        });
        self.dirty = true;
    }

    pub fn render(&self) -> String {
        self.entries.iter().map(Entry::raw).collect()
    }

    /// Atomic replace, skipped entirely when nothing changed.
    pub fn save_if_changed(&mut self) -> Result<bool, DotenvError> {
        if !self.dirty {
            return Ok(false);
        }
        fsutil::replace_atomically(&self.path, &self.render()).map_err(|source| {
            DotenvError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        self.dirty = false;
        Ok(true)
    }
}

/// Line text minus its terminator (`\n` or `\r\n`).
fn line_body(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line)
}
