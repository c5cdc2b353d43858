use std::fs;
use std::path::Path;

use age::secrecy::{ExposeSecret, SecretString};

use crate::core::errors::{AppBackupError, Result};
use crate::core::models::app_spec::SafeStorage;
use crate::core::services::catalog::CHROME_KEYRING_SCHEMA;
use crate::core::services::wipe;
use crate::core::traits::keyring::Keyring;

/// File name the exported key travels under inside the encrypted archive.
pub const KEY_FILE_NAME: &str = ".safe-storage-key";

/// Whether an import changed the keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportResult {
    Unchanged,
    Replaced,
}

/// Moves Chrome-class safe storage keys between the OS keyring and the archive.
pub struct SafeStorageKeys<'a> {
    keyring: &'a dyn Keyring,
}

impl<'a> SafeStorageKeys<'a> {
    pub fn new(keyring: &'a dyn Keyring) -> Self {
        Self { keyring }
    }

    /// Read the key from the keyring. `Ok(None)` when no entry exists.
    pub fn export_key(&self, app: &str, storage: &SafeStorage) -> Result<Option<SecretString>> {
        self.keyring
            .search(CHROME_KEYRING_SCHEMA, &[("application", storage.application)])
            .map_err(|e| AppBackupError::KeyExportFailed {
                app: app.to_string(),
                reason: e.to_string(),
            })
    }

    /// Install `key` into the keyring, unless the stored key is already identical.
    pub fn import_key(
        &self,
        app: &str,
        storage: &SafeStorage,
        key: &SecretString,
    ) -> Result<ImportResult> {
        let attributes = [("application", storage.application)];
        let existing = self
            .keyring
            .search(CHROME_KEYRING_SCHEMA, &attributes)
            .map_err(|e| AppBackupError::KeyImportFailed {
                app: app.to_string(),
                reason: e.to_string(),
            })?;

        if existing.is_some_and(|current| current.expose_secret() == key.expose_secret()) {
            return Ok(ImportResult::Unchanged);
        }

        self.keyring
            .store(CHROME_KEYRING_SCHEMA, storage.label, &attributes, key)
            .map_err(|e| AppBackupError::KeyImportFailed {
                app: app.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ImportResult::Replaced)
    }
}

/// Write an exported key into a staging directory (owner-only).
pub fn write_key_file(dir: &Path, key: &SecretString) -> Result<()> {
    let path = dir.join(KEY_FILE_NAME);
    fs::write(&path, key.expose_secret().as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Remove the key file from an extracted archive, returning its contents.
///
/// The file is securely erased so it can never be merged into a live profile.
pub fn take_key_file(dir: &Path) -> Result<Option<SecretString>> {
    let path = dir.join(KEY_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    wipe::secure_erase(&path)?;

    let key = content.trim_end_matches(['\r', '\n']).to_string();
    if key.is_empty() {
        return Ok(None);
    }
    Ok(Some(SecretString::from(key)))
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory keyring keyed by `schema|attr=value,...`.
    #[derive(Default)]
    pub struct FakeKeyring {
        pub entries: Mutex<HashMap<String, String>>,
        pub stores: Mutex<usize>,
        pub fail: bool,
    }

    impl FakeKeyring {
        fn key(schema: &str, attributes: &[(&str, &str)]) -> String {
            let attrs: Vec<String> = attributes.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{schema}|{}", attrs.join(","))
        }

        pub fn with_chrome_key(value: &str) -> Self {
            let keyring = Self::default();
            keyring.entries.lock().unwrap().insert(
                Self::key(CHROME_KEYRING_SCHEMA, &[("application", "chrome")]),
                value.to_string(),
            );
            keyring
        }

        pub fn chrome_key(&self) -> Option<String> {
            self.entries
                .lock()
                .unwrap()
                .get(&Self::key(CHROME_KEYRING_SCHEMA, &[("application", "chrome")]))
                .cloned()
        }
    }

    impl Keyring for FakeKeyring {
        fn search(&self, schema: &str, attributes: &[(&str, &str)]) -> Result<Option<SecretString>> {
            if self.fail {
                return Err(AppBackupError::KeyExportFailed {
                    app: "keyring".into(),
                    reason: "locked".into(),
                });
            }
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(&Self::key(schema, attributes))
                .map(|v| SecretString::from(v.clone())))
        }

        fn store(
            &self,
            schema: &str,
            _label: &str,
            attributes: &[(&str, &str)],
            value: &SecretString,
        ) -> Result<()> {
            *self.stores.lock().unwrap() += 1;
            self.entries.lock().unwrap().insert(
                Self::key(schema, attributes),
                value.expose_secret().to_string(),
            );
            Ok(())
        }
    }

    fn chrome() -> SafeStorage {
        SafeStorage {
            application: "chrome",
            label: "Chrome Safe Storage",
        }
    }

    #[test]
    fn export_found_and_missing() {
        let keyring = FakeKeyring::with_chrome_key("peanuts");
        let keys = SafeStorageKeys::new(&keyring);
        let key = keys.export_key("chrome", &chrome()).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "peanuts");

        let empty = FakeKeyring::default();
        let keys = SafeStorageKeys::new(&empty);
        assert!(keys.export_key("chrome", &chrome()).unwrap().is_none());
    }

    #[test]
    fn export_failure_is_key_export_error() {
        let keyring = FakeKeyring {
            fail: true,
            ..Default::default()
        };
        let err = SafeStorageKeys::new(&keyring)
            .export_key("chrome", &chrome())
            .unwrap_err();
        assert!(matches!(err, AppBackupError::KeyExportFailed { .. }));
    }

    #[test]
    fn import_identical_key_is_noop() {
        let keyring = FakeKeyring::with_chrome_key("same");
        let keys = SafeStorageKeys::new(&keyring);
        let result = keys
            .import_key("chrome", &chrome(), &SecretString::from("same".to_string()))
            .unwrap();
        assert_eq!(result, ImportResult::Unchanged);
        assert_eq!(*keyring.stores.lock().unwrap(), 0);
    }

    #[test]
    fn import_different_key_replaces() {
        let keyring = FakeKeyring::with_chrome_key("old");
        let keys = SafeStorageKeys::new(&keyring);
        let result = keys
            .import_key("chrome", &chrome(), &SecretString::from("new".to_string()))
            .unwrap();
        assert_eq!(result, ImportResult::Replaced);
        assert_eq!(keyring.chrome_key().as_deref(), Some("new"));
    }

    #[test]
    fn key_file_round_trip_erases_file() {
        let dir = tempfile::tempdir().unwrap();
        write_key_file(dir.path(), &SecretString::from("k3y".to_string())).unwrap();
        assert!(dir.path().join(KEY_FILE_NAME).exists());

        let key = take_key_file(dir.path()).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "k3y");
        assert!(!dir.path().join(KEY_FILE_NAME).exists());
        assert!(take_key_file(dir.path()).unwrap().is_none());
    }
}
