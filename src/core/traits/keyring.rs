use age::secrecy::SecretString;

use crate::core::errors::Result;

/// Opaque OS keyring capability (libsecret-style schema + attributes).
pub trait Keyring: Send + Sync {
    /// Look up the secret stored under `schema` with the given attributes.
    fn search(&self, schema: &str, attributes: &[(&str, &str)]) -> Result<Option<SecretString>>;

    /// Create or replace the secret stored under `schema` with the given attributes.
    fn store(
        &self,
        schema: &str,
        label: &str,
        attributes: &[(&str, &str)],
        value: &SecretString,
    ) -> Result<()>;
}
