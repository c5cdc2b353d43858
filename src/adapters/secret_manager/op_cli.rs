use age::secrecy::SecretString;

use crate::adapters::exec;
use crate::core::errors::{AppBackupError, Result};
use crate::core::traits::secret_manager::SecretManager;

/// 1Password CLI secret manager (`op read <reference>`).
pub struct OnePasswordCli {
    op_path: String,
}

impl OnePasswordCli {
    /// Create a new secret manager using the default `op` binary.
    pub fn new() -> Self {
        Self {
            op_path: "op".to_string(),
        }
    }
}

impl Default for OnePasswordCli {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretManager for OnePasswordCli {
    fn read(&self, reference: &str) -> Result<SecretString> {
        let output = exec::run(&self.op_path, &["read", "--no-newline", reference], None, None)
            .map_err(|e| AppBackupError::SecretUnavailable {
                reason: format!("Failed to run {}: {e}", self.op_path),
            })?;

        if !output.status.success() {
            return Err(AppBackupError::SecretUnavailable {
                reason: exec::stderr_of(&output),
            });
        }

        let value = String::from_utf8(output.stdout).map_err(|_| AppBackupError::SecretUnavailable {
            reason: format!("{reference} is not valid UTF-8"),
        })?;
        if value.trim().is_empty() {
            return Err(AppBackupError::SecretUnavailable {
                reason: format!("{reference} is empty"),
            });
        }
        Ok(SecretString::from(value))
    }
}
