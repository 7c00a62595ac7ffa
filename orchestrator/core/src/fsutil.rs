//! Filesystem primitives shared by the reconcilers.
//!
//! Text is read and written as UTF-8 with no newline translation; the
//! round-trip guarantees of the dotenv store and the hosts manager depend on
//! that.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Idempotent `mkdir -p`. Fails if `path` exists and is not a directory.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", path.display()),
        ));
    }
    fs::create_dir_all(path)
}

pub fn read_text(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

pub fn write_text(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, content)
}

/// Write through a sibling temp file and rename over the target, so a
/// partial write is never observable. Permissions of an existing target are
/// preserved; a fresh target gets world-readable mode rather than the temp
/// file's private one.
pub fn replace_atomically(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let existing = fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    match existing {
        Some(perms) => tmp.as_file().set_permissions(perms)?,
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tmp.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
            }
        }
    }
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
