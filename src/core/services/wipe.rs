//! Best-effort secure deletion of plaintext scratch files.
//!
//! Overwriting in place does not guarantee the old blocks are gone on
//! copy-on-write or journaling filesystems, so callers treat the result as
//! a hardening signal only.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use walkdir::WalkDir;

const ZERO_CHUNK: usize = 64 * 1024;

/// Overwrite `path` with zeros, flush it to disk and unlink it.
///
/// Returns `Ok(true)` when the overwrite succeeded, `Ok(false)` when the file
/// could only be unlinked. Fails only if the file could not be removed at all.
pub fn secure_erase(path: &Path) -> io::Result<bool> {
    let overwritten = match overwrite_with_zeros(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("overwrite of {} failed, falling back to unlink: {e}", path.display());
            false
        }
    };
    fs::remove_file(path)?;
    Ok(overwritten)
}

/// Securely erase every regular file below `dir`, then remove the tree.
///
/// Returns how many files were overwritten before removal. A missing
/// directory is not an error.
pub fn erase_dir(dir: &Path) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut overwritten = 0;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() && secure_erase(entry.path())? {
            overwritten += 1;
        }
    }

    fs::remove_dir_all(dir)?;
    Ok(overwritten)
}

fn overwrite_with_zeros(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::other("not a regular file"));
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    let zeros = [0u8; ZERO_CHUNK];
    let mut remaining = meta.len();
    while remaining > 0 {
        let n = remaining.min(ZERO_CHUNK as u64) as usize;
        file.write_all(&zeros[..n])?;
        remaining -= n as u64;
    }
    file.sync_all()
}
