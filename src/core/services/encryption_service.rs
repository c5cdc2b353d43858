use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use age::secrecy::SecretString;

use crate::core::errors::{AppBackupError, Result};
use crate::core::services::wipe;
use crate::core::traits::cipher::CipherBackend;

/// Turns plaintext archives into encrypted artifacts and back.
pub struct EncryptionService<'a> {
    pub cipher: &'a dyn CipherBackend,
}

impl<'a> EncryptionService<'a> {
    pub fn new(cipher: &'a dyn CipherBackend) -> Self {
        Self { cipher }
    }

    /// Encrypt `archive` for `recipient` into `dest`, then securely erase the plaintext.
    ///
    /// The ciphertext is written straight from the encryptor; no plaintext
    /// bytes are ever written at `dest`. On failure a partial `dest` is removed.
    pub fn encrypt_file(&self, archive: &Path, recipient: &str, dest: &Path) -> Result<PathBuf> {
        let result = self.encrypt_to(archive, recipient, dest);
        if result.is_err() && dest.exists() {
            let _ = fs::remove_file(dest);
        }
        result?;

        match wipe::secure_erase(archive) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("plaintext {} unlinked without overwrite", archive.display())
            }
            Err(e) => tracing::warn!("could not remove plaintext {}: {e}", archive.display()),
        }
        Ok(dest.to_path_buf())
    }

    fn encrypt_to(&self, archive: &Path, recipient: &str, dest: &Path) -> Result<()> {
        let mut input = BufReader::new(File::open(archive)?);
        let mut output = BufWriter::new(File::create(dest)?);
        tracing::debug!("encrypting {} with {}", archive.display(), self.cipher.name());
        self.cipher.encrypt(&mut input, &mut output, recipient)?;
        output.flush().map_err(|e| AppBackupError::EncryptionFailed {
            reason: format!("Write failed: {e}"),
        })?;
        Ok(())
    }

    /// Decrypt `artifact` into `dest` with an identity held in memory.
    ///
    /// A partially written `dest` is securely erased on failure.
    pub fn decrypt_file(
        &self,
        artifact: &Path,
        identity: &SecretString,
        dest: &Path,
    ) -> Result<()> {
        if !artifact.exists() {
            return Err(AppBackupError::ArtifactNotFound {
                path: artifact.to_path_buf(),
            });
        }

        let mut input = BufReader::new(File::open(artifact)?);
        let result = File::create(dest).map_err(AppBackupError::from).and_then(|file| {
            let mut output = BufWriter::new(file);
            self.cipher.decrypt(&mut input, &mut output, identity)?;
            output.flush().map_err(|e| AppBackupError::DecryptionFailed {
                reason: format!("Write failed: {e}"),
            })
        });

        if result.is_err() && dest.exists() {
            let _ = wipe::secure_erase(dest);
        }
        result
    }
}
