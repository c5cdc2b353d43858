use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::errors::Result;
use crate::core::services::wipe;

/// Owner-only temporary directory holding every plaintext file of a run.
///
/// Dropping it securely erases the contents before the directory itself
/// is removed.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("app-backup-").tempdir()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create (if needed) and return a fresh subdirectory.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        if path.exists() {
            wipe::erase_dir(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Ok(entries) = fs::read_dir(self.dir.path()) {
            for entry in entries.flatten() {
                let path = entry.path();
                let result = if path.is_dir() {
                    wipe::erase_dir(&path).map(|_| ())
                } else {
                    wipe::secure_erase(&path).map(|_| ())
                };
                if let Err(e) = result {
                    tracing::warn!("Could not erase scratch entry {}: {e}", path.display());
                }
            }
        }
    }
}
