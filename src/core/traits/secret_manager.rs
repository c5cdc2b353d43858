use age::secrecy::SecretString;

use crate::core::errors::Result;

/// Opaque "read secret by reference" capability (e.g. 1Password `op read`).
pub trait SecretManager: Send + Sync {
    /// Resolve `reference`. Fails with `SecretUnavailable` when the
    /// manager is locked or unreachable.
    fn read(&self, reference: &str) -> Result<SecretString>;
}
