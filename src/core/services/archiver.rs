//! Deterministic tar+gzip packaging of staged essential files.
//!
//! Two builds over identical staging directories produce byte-identical
//! archives: entries are sorted by path and every header field that would
//! vary between machines or runs (mtime, owner, mode) is normalised.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use globset::GlobSet;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::core::errors::{AppBackupError, Result};

/// Modification time written into every tar header and the gzip header.
pub const ARCHIVE_MTIME: u64 = 0;

/// Mode written into every tar header; profile data is private.
const ARCHIVE_MODE: u32 = 0o600;

/// A built archive and what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveOutput {
    pub path: PathBuf,
    pub entries: usize,
    pub size_bytes: u64,
    /// Hex SHA-256 of the compressed archive.
    pub sha256: String,
}

/// Selects, stages, packages and unpacks essential files.
pub struct Archiver;

impl Archiver {
    /// File-list mode: keep the listed paths that exist as regular files,
    /// plus every regular file below each of `copy_dirs`.
    ///
    /// Returned paths are relative to `root`, sorted and unique.
    pub fn resolve_listed(
        &self,
        root: &Path,
        files: &[PathBuf],
        copy_dirs: &[PathBuf],
    ) -> Result<Vec<PathBuf>> {
        let mut found = BTreeSet::new();

        for rel in files {
            if is_regular_file(&root.join(rel)) {
                found.insert(rel.clone());
            }
        }

        for dir in copy_dirs {
            let full = root.join(dir);
            if !full.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&full).follow_links(false) {
                let entry = entry.map_err(|e| AppBackupError::ArchiveFailed {
                    reason: format!("Failed to walk {}: {e}", full.display()),
                })?;
                if entry.file_type().is_file() {
                    found.insert(relative(root, entry.path())?);
                }
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Pattern mode: every regular file below `root` whose relative path
    /// matches one of the compiled patterns.
    pub fn resolve_patterns(&self, root: &Path, set: &GlobSet) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = BTreeSet::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| AppBackupError::ArchiveFailed {
                reason: format!("Failed to walk {}: {e}", root.display()),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative(root, entry.path())?;
            if set.is_match(&rel) {
                found.insert(rel);
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Copy `files` (relative to `root`) into `staging`, preserving relative paths.
    pub fn stage(&self, root: &Path, files: &[PathBuf], staging: &Path) -> Result<usize> {
        for rel in files {
            let dest = staging.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(root.join(rel), &dest)?;
        }
        Ok(files.len())
    }

    /// Package every regular file below `staging` into a gzip'd tar at `output`.
    pub fn build(&self, staging: &Path, output: &Path) -> Result<ArchiveOutput> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(staging).follow_links(false) {
            let entry = entry.map_err(|e| AppBackupError::ArchiveFailed {
                reason: format!("Failed to walk staging directory: {e}"),
            })?;
            if entry.file_type().is_file() {
                let name = entry_name(&relative(staging, entry.path())?)?;
                entries.push((name, entry.path().to_path_buf()));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        if entries.is_empty() {
            return Err(AppBackupError::ArchiveFailed {
                reason: format!("Nothing staged in {}", staging.display()),
            });
        }

        let file = File::create(output)?;
        let encoder = GzBuilder::new()
            .mtime(ARCHIVE_MTIME as u32)
            .write(file, Compression::default());
        let mut tar = tar::Builder::new(encoder);

        for (name, path) in &entries {
            let source = File::open(path)?;
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(source.metadata()?.len());
            header.set_mode(ARCHIVE_MODE);
            header.set_mtime(ARCHIVE_MTIME);
            header.set_uid(0);
            header.set_gid(0);
            tar.append_data(&mut header, name, source)
                .map_err(|e| AppBackupError::ArchiveFailed {
                    reason: format!("Failed to add {name}: {e}"),
                })?;
        }

        let encoder = tar.into_inner()?;
        encoder.finish()?;

        Ok(ArchiveOutput {
            path: output.to_path_buf(),
            entries: entries.len(),
            size_bytes: fs::metadata(output)?.len(),
            sha256: sha256_file(output)?,
        })
    }

    /// Unpack `archive` into `dest`; returns the number of files written.
    ///
    /// Entries that would land outside `dest` make the whole archive invalid.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<usize> {
        fs::create_dir_all(dest)?;
        let file = File::open(archive)?;
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let corrupt = |e: io::Error| AppBackupError::ArchiveFailed {
            reason: format!("Corrupt archive {}: {e}", archive.display()),
        };

        let mut count = 0;
        for entry in tar.entries().map_err(corrupt)? {
            let mut entry = entry.map_err(corrupt)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            if !entry.unpack_in(dest).map_err(corrupt)? {
                return Err(AppBackupError::ArchiveFailed {
                    reason: format!(
                        "Archive entry escapes the destination: {}",
                        entry.path().map(|p| p.display().to_string()).unwrap_or_default()
                    ),
                });
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_file())
}

fn relative(root: &Path, path: &Path) -> Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|e| AppBackupError::ArchiveFailed {
            reason: format!("Failed to compute relative path of {}: {e}", path.display()),
        })
}

/// `/`-joined archive entry name for a relative path.
fn entry_name(rel: &Path) -> Result<String> {
    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| AppBackupError::ArchiveFailed {
                    reason: format!("Non UTF-8 path: {}", rel.display()),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}
