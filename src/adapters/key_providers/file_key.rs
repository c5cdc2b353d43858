use std::path::PathBuf;

use age::secrecy::SecretString;

use crate::core::errors::{AppBackupError, Result};
use crate::core::traits::key_provider::KeyProvider;

/// Reads the identity from a local age identity file.
///
/// Format: the standard `age-keygen` output, e.g.
/// ```text
/// # created: 2026-02-20T10:00:00Z
/// # public key: age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p
/// AGE-SECRET-KEY-1...
/// ```
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl KeyProvider for FileKeyProvider {
    fn identity_key(&self) -> Result<SecretString> {
        if !self.path.is_file() {
            return Err(AppBackupError::IdentityKeyNotFound {
                path: self.path.clone(),
            });
        }
        let content = std::fs::read_to_string(&self.path)?;
        if !content.lines().any(|l| l.trim_start().starts_with("AGE-SECRET-KEY-")) {
            return Err(AppBackupError::IdentityKeyNotFound {
                path: self.path.clone(),
            });
        }
        Ok(SecretString::from(content))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
