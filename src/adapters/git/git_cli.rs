use std::path::Path;
use std::process::Output;

use crate::adapters::exec;
use crate::core::errors::{AppBackupError, Result};
use crate::core::traits::git_transport::GitTransport;

/// Git transport driving the `git` command line.
pub struct GitCli {
    git_path: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }

    fn raw(&self, repo: Option<&Path>, args: &[&str]) -> Result<Output> {
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 2);
        let repo_str;
        if let Some(repo) = repo {
            repo_str = repo.to_string_lossy().into_owned();
            full.push("-C");
            full.push(&repo_str);
        }
        full.extend_from_slice(args);

        exec::run(&self.git_path, &full, None, None).map_err(|e| AppBackupError::TransportFailed {
            reason: format!("Failed to run {}: {e}", self.git_path),
        })
    }

    /// Run git and require success, returning trimmed stdout.
    fn git(&self, repo: Option<&Path>, args: &[&str]) -> Result<String> {
        let output = self.raw(repo, args)?;
        if !output.status.success() {
            return Err(AppBackupError::TransportFailed {
                reason: format!("git {} failed: {}", args.join(" "), exec::stderr_of(&output)),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitTransport for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.git(None, &["clone", url, &dest]).map(|_| ())
    }

    fn reset_hard(&self, repo: &Path) -> Result<()> {
        self.git(Some(repo), &["reset", "--hard"])?;
        self.git(Some(repo), &["clean", "-fd"]).map(|_| ())
    }

    fn pull_rebase(&self, repo: &Path) -> Result<()> {
        let result = self.git(Some(repo), &["pull", "--rebase", "--autostash"]);
        if result.is_err() {
            // Leave the mirror usable for the next run.
            let _ = self.raw(Some(repo), &["rebase", "--abort"]);
        }
        result.map(|_| ())
    }

    fn has_upstream(&self, repo: &Path) -> Result<bool> {
        let output = self.raw(
            Some(repo),
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
        )?;
        Ok(output.status.success())
    }

    fn add(&self, repo: &Path, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(Some(repo), &args).map(|_| ())
    }

    fn has_staged_changes(&self, repo: &Path) -> Result<bool> {
        let output = self.raw(Some(repo), &["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(AppBackupError::TransportFailed {
                reason: format!("git diff --cached failed: {}", exec::stderr_of(&output)),
            }),
        }
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.git(Some(repo), &["commit", "-m", message]).map(|_| ())
    }

    fn push(&self, repo: &Path) -> Result<()> {
        self.git(Some(repo), &["push", "-u", "origin", "HEAD"]).map(|_| ())
    }

    fn lfs_install(&self, repo: &Path) -> Result<()> {
        self.git(Some(repo), &["lfs", "install", "--local"]).map(|_| ())
    }

    fn remote_url(&self, repo: &Path) -> Result<Option<String>> {
        let output = self.raw(Some(repo), &["remote", "get-url", "origin"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }

    fn fetch(&self, repo: &Path) -> Result<()> {
        self.git(Some(repo), &["fetch", "--quiet"]).map(|_| ())
    }

    fn rev_parse(&self, repo: &Path, rev: &str) -> Result<Option<String>> {
        let output = self.raw(Some(repo), &["rev-parse", "--verify", "--quiet", rev])?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    fn log_oneline(&self, repo: &Path, range: &str) -> Result<Vec<String>> {
        let out = self.git(Some(repo), &["log", "--oneline", range])?;
        Ok(out.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        exec::run("git", &["--version"], None, None).is_ok_and(|o| o.status.success())
    }

    fn init_repo(dir: &Path) {
        let git = GitCli::new();
        git.git(Some(dir), &["init", "--quiet"]).unwrap();
        git.git(Some(dir), &["config", "user.email", "test@example.com"]).unwrap();
        git.git(Some(dir), &["config", "user.name", "Test"]).unwrap();
    }

    #[test]
    fn missing_binary_is_transport_failure() {
        let git = GitCli {
            git_path: "app-backup-no-such-git".into(),
        };
        let err = git.fetch(Path::new(".")).unwrap_err();
        assert!(matches!(err, AppBackupError::TransportFailed { .. }));
    }

    #[test]
    fn stage_and_commit_in_fresh_repo() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = GitCli::new();

        assert!(!git.has_upstream(dir.path()).unwrap());
        assert!(git.remote_url(dir.path()).unwrap().is_none());
        assert!(git.rev_parse(dir.path(), "HEAD").unwrap().is_none());

        std::fs::write(dir.path().join("chrome-profile.tar.gz.age"), b"x").unwrap();
        git.add(dir.path(), &["chrome-profile.tar.gz.age".to_string()]).unwrap();
        assert!(git.has_staged_changes(dir.path()).unwrap());

        git.commit(dir.path(), "backup: chrome").unwrap();
        assert!(!git.has_staged_changes(dir.path()).unwrap());
        assert!(git.rev_parse(dir.path(), "HEAD").unwrap().is_some());
        assert_eq!(git.log_oneline(dir.path(), "HEAD").unwrap().len(), 1);
    }

    #[test]
    fn reset_hard_discards_untracked_files() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = GitCli::new();
        std::fs::write(dir.path().join("a"), b"1").unwrap();
        git.add(dir.path(), &["a".to_string()]).unwrap();
        git.commit(dir.path(), "init").unwrap();

        std::fs::write(dir.path().join("a"), b"2").unwrap();
        std::fs::write(dir.path().join("stray"), b"junk").unwrap();
        git.reset_hard(dir.path()).unwrap();

        assert_eq!(std::fs::read(dir.path().join("a")).unwrap(), b"1");
        assert!(!dir.path().join("stray").exists());
    }
}
