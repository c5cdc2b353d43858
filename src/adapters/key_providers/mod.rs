pub mod file_key;
pub mod secret_manager_key;

use crate::config::app_config::IdentitySource;
use crate::core::traits::key_provider::KeyProvider;
use crate::core::traits::secret_manager::SecretManager;

use file_key::FileKeyProvider;
use secret_manager_key::SecretManagerKeyProvider;

/// Build the key provider for the resolved identity source.
///
/// The secret manager is only consulted for `IdentitySource::SecretManager`.
pub fn for_source<'a>(
    source: &IdentitySource,
    manager: &'a dyn SecretManager,
) -> Box<dyn KeyProvider + 'a> {
    match source {
        IdentitySource::SecretManager(reference) => {
            Box::new(SecretManagerKeyProvider::new(manager, reference.clone()))
        }
        IdentitySource::File(path) => Box::new(FileKeyProvider::new(path.clone())),
    }
}
