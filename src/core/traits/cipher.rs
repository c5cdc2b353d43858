use std::io::{Read, Write};

use age::secrecy::SecretString;

use crate::core::errors::Result;

/// Port for encryption/decryption backends.
///
/// Implementations live in `adapters::cipher`. The core layer only
/// depends on this trait, never on a concrete backend.
pub trait CipherBackend: Send + Sync {
    /// Stream `input` to `output`, encrypted for a single public recipient.
    fn encrypt(&self, input: &mut dyn Read, output: &mut dyn Write, recipient: &str) -> Result<()>;

    /// Stream `input` to `output`, decrypted with the in-memory identity.
    fn decrypt(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        identity: &SecretString,
    ) -> Result<()>;

    /// Human-readable name of this backend (e.g. "age").
    fn name(&self) -> &str;
}
