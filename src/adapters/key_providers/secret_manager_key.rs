use age::secrecy::SecretString;

use crate::core::errors::Result;
use crate::core::traits::key_provider::KeyProvider;
use crate::core::traits::secret_manager::SecretManager;

/// Reads the identity through a secret manager on every call; nothing is cached.
pub struct SecretManagerKeyProvider<'a> {
    manager: &'a dyn SecretManager,
    reference: String,
}

impl<'a> SecretManagerKeyProvider<'a> {
    pub fn new(manager: &'a dyn SecretManager, reference: String) -> Self {
        Self { manager, reference }
    }
}

impl KeyProvider for SecretManagerKeyProvider<'_> {
    fn identity_key(&self) -> Result<SecretString> {
        self.manager.read(&self.reference)
    }

    fn describe(&self) -> String {
        format!("secret manager {}", self.reference)
    }
}
