use std::io::{self, Read, Write};

use age::secrecy::{ExposeSecret, SecretString};

use crate::core::errors::{AppBackupError, Result};
use crate::core::traits::cipher::CipherBackend;

/// Age encryption backend using X25519 + ChaCha20-Poly1305.
///
/// Artifacts use the binary age format; they are large and only ever
/// handled as whole files, so ASCII armor would just add a third.
/// Identities are parsed from memory and never touch the filesystem.
pub struct AgeBackend;

impl AgeBackend {
    /// Parse a recipient string into an age X25519 recipient.
    fn parse_recipient(key: &str) -> Result<age::x25519::Recipient> {
        key.trim()
            .parse::<age::x25519::Recipient>()
            .map_err(|e: &str| AppBackupError::EncryptionFailed {
                reason: format!("Invalid recipient key '{key}': {e}"),
            })
    }

    /// Parse identity-file content (comments allowed) held in memory.
    fn parse_identities(identity: &SecretString) -> Result<Vec<Box<dyn age::Identity>>> {
        let identity_file = age::IdentityFile::from_buffer(identity.expose_secret().as_bytes())
            .map_err(|e| AppBackupError::DecryptionFailed {
                reason: format!("Identity key is not a valid age identity: {e}"),
            })?;

        let identities =
            identity_file
                .into_identities()
                .map_err(|e| AppBackupError::DecryptionFailed {
                    reason: format!("Identity key is not a valid age identity: {e}"),
                })?;

        if identities.is_empty() {
            return Err(AppBackupError::DecryptionFailed {
                reason: "Identity key contains no AGE-SECRET-KEY entry".into(),
            });
        }
        Ok(identities)
    }
}

impl CipherBackend for AgeBackend {
    fn encrypt(&self, input: &mut dyn Read, output: &mut dyn Write, recipient: &str) -> Result<()> {
        let recipient = Self::parse_recipient(recipient)?;

        let encryptor =
            age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
                .map_err(|e| AppBackupError::EncryptionFailed {
                    reason: format!("{e}"),
                })?;

        let mut writer =
            encryptor
                .wrap_output(output)
                .map_err(|e| AppBackupError::EncryptionFailed {
                    reason: format!("Encryption stream failed: {e}"),
                })?;

        io::copy(input, &mut writer).map_err(|e| AppBackupError::EncryptionFailed {
            reason: format!("Write failed: {e}"),
        })?;

        writer
            .finish()
            .map_err(|e| AppBackupError::EncryptionFailed {
                reason: format!("Encryption finish failed: {e}"),
            })?;

        Ok(())
    }

    fn decrypt(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        identity: &SecretString,
    ) -> Result<()> {
        let identities = Self::parse_identities(identity)?;

        let decryptor = age::Decryptor::new(input).map_err(|e| AppBackupError::DecryptionFailed {
            reason: format!("Invalid encrypted file: {e}"),
        })?;

        let mut reader = decryptor
            .decrypt(identities.iter().map(|i| i.as_ref()))
            .map_err(|e| AppBackupError::DecryptionFailed {
                reason: format!("{e}"),
            })?;

        io::copy(&mut reader, output).map_err(|e| AppBackupError::DecryptionFailed {
            reason: format!("Read decrypted data failed: {e}"),
        })?;

        Ok(())
    }

    fn name(&self) -> &str {
        "age"
    }
}
