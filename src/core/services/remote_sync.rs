//! Local mirror of the remote artifact store.
//!
//! The mirror is a git working tree holding one `<app>-profile.tar.gz.age`
//! per application plus `digests.json`, one keyed digest per artifact (see
//! [`artifact_digest`]). age output is randomised, so the digest is what
//! tells an unchanged profile apart from a changed one.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::core::errors::{AppBackupError, Result};
use crate::core::traits::git_transport::GitTransport;

/// Artifacts larger than this are stored through git LFS.
pub const LFS_THRESHOLD: u64 = 100 * 1024 * 1024;

pub const DIGESTS_FILE: &str = "digests.json";
const ATTRIBUTES_FILE: &str = ".gitattributes";

/// HKDF context for mirror digests.
const DIGEST_INFO: &[u8] = b"app-backup mirror digest v1";

/// Remote branches probed by `status`, in order.
const REMOTE_BRANCHES: [&str; 2] = ["origin/main", "origin/master"];

/// An encrypted artifact produced by this run, waiting to enter the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedArtifact {
    pub app: String,
    /// File name inside the mirror, e.g. `chrome-profile.tar.gz.age`.
    pub name: String,
    /// Ciphertext location in the scratch directory.
    pub path: PathBuf,
    /// Keyed digest from `artifact_digest`.
    pub digest: String,
}

/// What a push run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    /// Mirror paths that changed and were staged.
    pub changed: Vec<String>,
    /// Artifacts newly routed through LFS.
    pub lfs_added: Vec<String>,
    pub committed: bool,
    pub pushed: bool,
    /// Push failure; the local commit is kept for a manual retry.
    pub push_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Cloned,
    Updated,
    /// The mirror exists but could not be refreshed; restore uses local files.
    RemoteUnavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteState {
    NoMirror,
    /// Remote information is unavailable; only the local files are reported.
    LocalOnly(String),
    Tracking {
        branch: String,
        /// Remote commits not yet in the mirror.
        incoming: Vec<String>,
        /// Mirror commits not yet pushed.
        outgoing: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub mirror: PathBuf,
    pub remote_url: Option<String>,
    pub state: RemoteState,
    pub artifacts: Vec<ArtifactInfo>,
}

/// Moves encrypted artifacts between the scratch directory, the mirror and the remote.
pub struct RemoteSync<'a> {
    git: &'a dyn GitTransport,
    lfs_threshold: u64,
}

impl<'a> RemoteSync<'a> {
    pub fn new(git: &'a dyn GitTransport) -> Self {
        Self {
            git,
            lfs_threshold: LFS_THRESHOLD,
        }
    }

    #[cfg(test)]
    pub fn with_lfs_threshold(mut self, bytes: u64) -> Self {
        self.lfs_threshold = bytes;
        self
    }

    /// Bring the mirror up to date, copy in changed artifacts, commit and push.
    pub fn push(
        &self,
        mirror: &Path,
        url: &str,
        artifacts: &[StagedArtifact],
    ) -> Result<PushReport> {
        if is_repo(mirror) {
            self.git.reset_hard(mirror)?;
            if self.git.has_upstream(mirror)? {
                self.git.pull_rebase(mirror)?;
            }
            self.warn_on_foreign_remote(mirror, url);
        } else {
            self.clone_into(mirror, url)?;
        }

        let mut report = PushReport {
            changed: place_artifacts(mirror, artifacts)?,
            ..PushReport::default()
        };

        let mut any_large = false;
        for artifact in artifacts {
            let size = fs::metadata(mirror.join(&artifact.name))?.len();
            if size <= self.lfs_threshold {
                continue;
            }
            any_large = true;
            if ensure_lfs_pattern(mirror, &artifact.name)? {
                tracing::info!("routing {} through git LFS ({size} bytes)", artifact.name);
                report.lfs_added.push(artifact.name.clone());
            }
        }
        if any_large {
            self.git.lfs_install(mirror)?;
        }
        if !report.lfs_added.is_empty() {
            report.changed.insert(0, ATTRIBUTES_FILE.to_string());
        }

        self.git.add(mirror, &report.changed)?;
        if self.git.has_staged_changes(mirror)? {
            self.git.commit(mirror, &commit_message(artifacts))?;
            report.committed = true;
        } else {
            tracing::debug!("artifact set unchanged, nothing to commit");
        }

        if self.needs_push(mirror)? {
            match self.git.push(mirror) {
                Ok(()) => report.pushed = true,
                Err(e) => {
                    tracing::warn!("push failed, local commit kept: {e}");
                    report.push_error = Some(transport_reason(e));
                }
            }
        }
        Ok(report)
    }

    /// Copy changed artifacts into the mirror without touching git.
    pub fn stage_local(&self, mirror: &Path, artifacts: &[StagedArtifact]) -> Result<Vec<String>> {
        fs::create_dir_all(mirror)?;
        place_artifacts(mirror, artifacts)
    }

    /// Clone the mirror if absent, otherwise rebase it onto the remote.
    pub fn pull(&self, mirror: &Path, url: &str) -> Result<PullOutcome> {
        if !is_repo(mirror) {
            self.clone_into(mirror, url)?;
            return Ok(PullOutcome::Cloned);
        }

        if !self.git.has_upstream(mirror)? {
            return Ok(PullOutcome::RemoteUnavailable(
                "current branch has no remote branch".into(),
            ));
        }
        match self.git.pull_rebase(mirror) {
            Ok(()) => Ok(PullOutcome::Updated),
            Err(e) => Ok(PullOutcome::RemoteUnavailable(transport_reason(e))),
        }
    }

    /// Describe the mirror and how it relates to the remote.
    ///
    /// Remote problems never fail the call; they degrade to `LocalOnly`.
    pub fn status(&self, mirror: &Path) -> Result<SyncStatus> {
        if !mirror.exists() {
            return Ok(SyncStatus {
                mirror: mirror.to_path_buf(),
                remote_url: None,
                state: RemoteState::NoMirror,
                artifacts: Vec::new(),
            });
        }

        let artifacts = list_artifacts(mirror)?;
        let remote_url = if is_repo(mirror) {
            self.git.remote_url(mirror).unwrap_or(None)
        } else {
            None
        };

        Ok(SyncStatus {
            mirror: mirror.to_path_buf(),
            state: self.remote_state(mirror, remote_url.is_some()),
            remote_url,
            artifacts,
        })
    }

    fn remote_state(&self, mirror: &Path, has_origin: bool) -> RemoteState {
        if !is_repo(mirror) {
            return RemoteState::LocalOnly("mirror is not a git repository".into());
        }
        if !has_origin {
            return RemoteState::LocalOnly("no origin remote configured".into());
        }
        if let Err(e) = self.git.fetch(mirror) {
            return RemoteState::LocalOnly(format!("remote unreachable: {}", transport_reason(e)));
        }

        let Some(branch) = REMOTE_BRANCHES
            .iter()
            .find(|b| matches!(self.git.rev_parse(mirror, b), Ok(Some(_))))
        else {
            return RemoteState::LocalOnly("remote has no main or master branch".into());
        };

        let has_head = matches!(self.git.rev_parse(mirror, "HEAD"), Ok(Some(_)));
        let (incoming, outgoing) = if has_head {
            (
                self.git.log_oneline(mirror, &format!("HEAD..{branch}")),
                self.git.log_oneline(mirror, &format!("{branch}..HEAD")),
            )
        } else {
            (self.git.log_oneline(mirror, branch), Ok(Vec::new()))
        };

        match (incoming, outgoing) {
            (Ok(incoming), Ok(outgoing)) => RemoteState::Tracking {
                branch: branch.to_string(),
                incoming,
                outgoing,
            },
            (Err(e), _) | (_, Err(e)) => RemoteState::LocalOnly(transport_reason(e)),
        }
    }

    fn clone_into(&self, mirror: &Path, url: &str) -> Result<()> {
        if mirror.exists() {
            // Artifacts staged without --push; the remote copy supersedes them.
            let aside = aside_path(mirror);
            if aside.exists() {
                fs::remove_dir_all(&aside)?;
            }
            fs::rename(mirror, &aside)?;
            tracing::warn!("moved unsynced mirror to {}", aside.display());
        }
        if let Some(parent) = mirror.parent() {
            fs::create_dir_all(parent)?;
        }
        self.git.clone_repo(url, mirror)
    }

    fn needs_push(&self, mirror: &Path) -> Result<bool> {
        let Some(head) = self.git.rev_parse(mirror, "HEAD")? else {
            return Ok(false);
        };
        if !self.git.has_upstream(mirror)? {
            return Ok(true);
        }
        Ok(self.git.rev_parse(mirror, "@{u}")?.as_deref() != Some(head.as_str()))
    }

    fn warn_on_foreign_remote(&self, mirror: &Path, url: &str) {
        if let Ok(Some(current)) = self.git.remote_url(mirror)
            && current != url
        {
            tracing::warn!("mirror origin is {current} but config says {url}; keeping {current}");
        }
    }
}

fn is_repo(mirror: &Path) -> bool {
    mirror.join(".git").exists()
}

fn aside_path(mirror: &Path) -> PathBuf {
    let mut name = mirror.file_name().unwrap_or_default().to_os_string();
    name.push(".unsynced");
    mirror.with_file_name(name)
}

fn transport_reason(err: AppBackupError) -> String {
    match err {
        AppBackupError::TransportFailed { reason } => reason,
        other => other.to_string(),
    }
}

fn commit_message(artifacts: &[StagedArtifact]) -> String {
    let apps: Vec<&str> = artifacts.iter().map(|a| a.app.as_str()).collect();
    format!(
        "backup: {} ({})",
        apps.join(", "),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Change-detection digest recorded in `digests.json`.
///
/// Keyed by the recipient, so rotating the recipient re-encrypts every
/// artifact, and the plaintext archive hash never reaches the remote.
pub fn artifact_digest(recipient: &str, archive_sha256: &str) -> Result<String> {
    let hkdf = Hkdf::<Sha256>::new(Some(DIGEST_INFO), recipient.trim().as_bytes());
    let mut output = [0u8; 32];
    hkdf.expand(archive_sha256.as_bytes(), &mut output)
        .map_err(|e| AppBackupError::ArchiveFailed {
            reason: format!("Digest derivation failed: {e}"),
        })?;
    Ok(output.iter().map(|b| format!("{b:02x}")).collect())
}

fn read_digests(mirror: &Path) -> BTreeMap<String, String> {
    fs::read_to_string(mirror.join(DIGESTS_FILE))
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

/// Copy artifacts whose digest changed into the mirror.
///
/// Returns the mirror-relative paths written, `digests.json` included.
fn place_artifacts(mirror: &Path, artifacts: &[StagedArtifact]) -> Result<Vec<String>> {
    let mut digests = read_digests(mirror);
    let mut changed = Vec::new();

    for artifact in artifacts {
        let dest = mirror.join(&artifact.name);
        if dest.exists() && digests.get(&artifact.name) == Some(&artifact.digest) {
            tracing::debug!("{} unchanged", artifact.name);
            continue;
        }

        let partial = mirror.join(format!(".{}.partial", artifact.name));
        fs::copy(&artifact.path, &partial)?;
        fs::rename(&partial, &dest)?;
        digests.insert(artifact.name.clone(), artifact.digest.clone());
        changed.push(artifact.name.clone());
    }

    if !changed.is_empty() {
        let json = serde_json::to_string_pretty(&digests).map_err(|e| {
            AppBackupError::TransportFailed {
                reason: format!("Failed to serialize {DIGESTS_FILE}: {e}"),
            }
        })?;
        fs::write(mirror.join(DIGESTS_FILE), format!("{json}\n"))?;
        changed.push(DIGESTS_FILE.to_string());
    }
    Ok(changed)
}

/// Make sure `.gitattributes` routes `name` through LFS. Returns whether a line was added.
pub fn ensure_lfs_pattern(mirror: &Path, name: &str) -> Result<bool> {
    let line = format!("{name} filter=lfs diff=lfs merge=lfs -text");
    let path = mirror.join(ATTRIBUTES_FILE);
    let existing = fs::read_to_string(&path).unwrap_or_default();

    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{line}")?;
    Ok(true)
}

fn list_artifacts(mirror: &Path) -> Result<Vec<ArtifactInfo>> {
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(mirror)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".age") && entry.file_type()?.is_file() {
            artifacts.push(ArtifactInfo {
                name,
                size_bytes: entry.metadata()?.len(),
            });
        }
    }
    artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(artifacts)
}
