use age::secrecy::SecretString;

use crate::core::errors::Result;

/// Port for retrieving the identity (private) key at the point of use.
///
/// The returned secret lives in memory only; providers never write it
/// anywhere.
pub trait KeyProvider: Send + Sync {
    fn identity_key(&self) -> Result<SecretString>;

    /// Short description of where the key comes from, for output.
    fn describe(&self) -> String;
}
