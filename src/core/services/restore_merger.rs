//! Merge-based restore into a live profile.
//!
//! Files from the archive overwrite their live counterparts; everything
//! else in the live profile is left alone. Live files about to change are
//! first copied into a sibling snapshot directory
//! `<profile>.backup-essential.<YYYYmmdd-HHMMSS>[-N]`, and old snapshots are
//! pruned down to the retention count.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use walkdir::WalkDir;

use crate::core::errors::{AppBackupError, Result};
use crate::core::models::restore_report::RestoreReport;

pub const SNAPSHOT_MARKER: &str = ".backup-essential.";
const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%d-%H%M%S";

pub struct RestoreMerger {
    retention: usize,
}

impl RestoreMerger {
    pub fn new(retention: usize) -> Self {
        Self { retention }
    }

    /// Merge every file below `source` into `live`.
    ///
    /// A snapshot is taken only when `live` exists and at least one file
    /// would change. Identical files are neither snapshotted nor rewritten,
    /// so repeating a restore is a no-op.
    pub fn merge(&self, source: &Path, live: &Path, now: DateTime<Local>) -> Result<RestoreReport> {
        let files = relative_files(source)?;
        let mut report = RestoreReport {
            target: live.to_path_buf(),
            ..RestoreReport::default()
        };

        let changed: Vec<&PathBuf> = files
            .iter()
            .filter(|rel| !same_contents(&source.join(rel), &live.join(rel)))
            .collect();

        if live.is_dir() {
            let overwritten: Vec<&PathBuf> = changed
                .iter()
                .copied()
                .filter(|rel| live.join(rel).is_file())
                .collect();

            if !overwritten.is_empty() {
                let snapshot = create_snapshot_dir(live, now)?;
                for rel in &overwritten {
                    let dest = snapshot.join(rel);
                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::copy(live.join(rel), &dest)?;
                }
                tracing::info!(
                    "snapshotted {} file(s) to {}",
                    overwritten.len(),
                    snapshot.display()
                );
                report.files_snapshotted = overwritten.len();
                report.snapshot = Some(snapshot);
            }
        }

        report.pruned = self.prune(live, report.snapshot.as_deref())?;

        for rel in changed {
            let dest = live.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source.join(rel), &dest)?;
            report.files_merged += 1;
        }

        Ok(report)
    }

    /// Delete the oldest snapshots of `live` beyond the retention count.
    ///
    /// `keep` (the snapshot of the current run) is never deleted and counts
    /// towards the retention count.
    pub fn prune(&self, live: &Path, keep: Option<&Path>) -> Result<Vec<PathBuf>> {
        let mut snapshots: Vec<(NaiveDateTime, u32, PathBuf)> = list_snapshots(live)?
            .into_iter()
            .filter(|(_, _, path)| Some(path.as_path()) != keep)
            .collect();
        snapshots.sort();

        let allowed = self.retention.saturating_sub(usize::from(keep.is_some()));
        let excess = snapshots.len().saturating_sub(allowed);

        let mut pruned = Vec::new();
        for (_, _, path) in snapshots.into_iter().take(excess) {
            fs::remove_dir_all(&path)?;
            tracing::debug!("pruned snapshot {}", path.display());
            pruned.push(path);
        }
        Ok(pruned)
    }
}

/// Snapshot directories of `live`, as (timestamp, collision suffix, path).
///
/// Directories whose name does not follow the snapshot convention are
/// not snapshots and are never touched.
pub fn list_snapshots(live: &Path) -> Result<Vec<(NaiveDateTime, u32, PathBuf)>> {
    let (Some(parent), Some(name)) = (live.parent(), live.file_name()) else {
        return Ok(Vec::new());
    };
    if !parent.is_dir() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}{SNAPSHOT_MARKER}", name.to_string_lossy());

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamp) = file_name.strip_prefix(&prefix) else {
            continue;
        };
        if let Some((time, suffix)) = parse_stamp(stamp) {
            snapshots.push((time, suffix, entry.path()));
        }
    }
    Ok(snapshots)
}

fn parse_stamp(stamp: &str) -> Option<(NaiveDateTime, u32)> {
    // "20260101-120000" is 15 bytes; an optional "-N" follows.
    let (time, rest) = stamp.split_at_checked(15)?;
    let time = NaiveDateTime::parse_from_str(time, SNAPSHOT_TIME_FORMAT).ok()?;
    let suffix = match rest {
        "" => 0,
        _ => rest.strip_prefix('-')?.parse().ok()?,
    };
    Some((time, suffix))
}

fn create_snapshot_dir(live: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    let name = live
        .file_name()
        .ok_or_else(|| AppBackupError::ArchiveFailed {
            reason: format!("Cannot snapshot {}", live.display()),
        })?
        .to_string_lossy()
        .into_owned();
    let base = format!("{name}{SNAPSHOT_MARKER}{}", now.format(SNAPSHOT_TIME_FORMAT));

    let mut candidate = live.with_file_name(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = live.with_file_name(format!("{base}-{n}"));
        n += 1;
    }
    fs::create_dir_all(&candidate)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&candidate, fs::Permissions::from_mode(0o700))?;
    }
    Ok(candidate)
}

fn relative_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| AppBackupError::ArchiveFailed {
            reason: format!("Failed to walk {}: {e}", root.display()),
        })?;
        if entry.file_type().is_file()
            && let Ok(rel) = entry.path().strip_prefix(root)
        {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

/// Whether two paths are regular files with identical bytes.
fn same_contents(a: &Path, b: &Path) -> bool {
    let (Ok(ma), Ok(mb)) = (fs::metadata(a), fs::metadata(b)) else {
        return false;
    };
    if !ma.is_file() || !mb.is_file() || ma.len() != mb.len() {
        return false;
    }
    let (Ok(fa), Ok(fb)) = (File::open(a), File::open(b)) else {
        return false;
    };

    let mut ra = BufReader::new(fa);
    let mut rb = BufReader::new(fb);
    let mut ba = [0u8; 8192];
    let mut bb = [0u8; 8192];
    loop {
        let Ok(n) = ra.read(&mut ba) else {
            return false;
        };
        if n == 0 {
            return true;
        }
        if rb.read_exact(&mut bb[..n]).is_err() || ba[..n] != bb[..n] {
            return false;
        }
    }
}
