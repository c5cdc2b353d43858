use std::path::Path;

use crate::core::errors::Result;

/// Version-control primitives used by remote sync.
///
/// Every method is a blocking call; failures map to `TransportFailed`.
pub trait GitTransport: Send + Sync {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Discard uncommitted changes (tracked and untracked) in the working tree.
    fn reset_hard(&self, repo: &Path) -> Result<()>;

    fn pull_rebase(&self, repo: &Path) -> Result<()>;

    /// Whether the current branch tracks a remote branch.
    fn has_upstream(&self, repo: &Path) -> Result<bool>;

    fn add(&self, repo: &Path, paths: &[String]) -> Result<()>;

    fn has_staged_changes(&self, repo: &Path) -> Result<bool>;

    fn commit(&self, repo: &Path, message: &str) -> Result<()>;

    fn push(&self, repo: &Path) -> Result<()>;

    /// Enable large-object storage hooks for this repository.
    fn lfs_install(&self, repo: &Path) -> Result<()>;

    fn remote_url(&self, repo: &Path) -> Result<Option<String>>;

    fn fetch(&self, repo: &Path) -> Result<()>;

    /// Resolve a revision to a commit id, `None` if it does not exist.
    fn rev_parse(&self, repo: &Path, rev: &str) -> Result<Option<String>>;

    /// One-line summaries of commits in `range`, newest first.
    fn log_oneline(&self, repo: &Path, range: &str) -> Result<Vec<String>>;
}
