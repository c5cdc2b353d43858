//! Built-in catalog of essential files per application.
//!
//! Only what is needed to come back logged in: cookies, saved credentials,
//! sync state and preferences. Caches, history, extensions and themes are
//! deliberately absent.

use std::path::PathBuf;

use globset::{GlobBuilder, GlobSetBuilder};
use regex::Regex;

use crate::core::errors::{AppBackupError, Result};
use crate::core::models::app_spec::{
    EssentialFileSpec, FileSelection, ProcessMarker, ProfileLayout, SafeStorage,
};

/// libsecret schema Chrome-class browsers store their safe storage key under.
pub const CHROME_KEYRING_SCHEMA: &str = "chrome_libsecret_os_crypt_password_v2";

/// Chrome-class files, relative to the browser's config directory.
const CHROMIUM_FILES: &[&str] = &[
    "Local State",
    "Default/Cookies",
    "Default/Cookies-journal",
    "Default/Network/Cookies",
    "Default/Network/Cookies-journal",
    "Default/Login Data",
    "Default/Login Data-journal",
    "Default/Login Data For Account",
    "Default/Login Data For Account-journal",
    "Default/Web Data",
    "Default/Web Data-journal",
    "Default/Preferences",
    "Default/Secure Preferences",
    "Default/Bookmarks",
    "Default/Trust Tokens",
];

const CHROMIUM_DIRS: &[&str] = &["Default/Sync Data", "Default/Local Storage/leveldb"];

/// Firefox patterns, relative to the active profile directory.
const FIREFOX_PATTERNS: &[&str] = &[
    "cookies.sqlite",
    "cookies.sqlite-wal",
    "logins.json",
    "logins-backup.json",
    "key4.db",
    "cert9.db",
    "signedInUser.json",
    "prefs.js",
    "containers.json",
    "permissions.sqlite",
    "sessionstore.jsonlz4",
    "sessionstore-backups/recovery.*",
    "storage/default/*/ls/*.sqlite",
];

const TERMIUS_FILES: &[&str] = &["Cookies", "Cookies-journal", "Preferences", "Local State"];

const TERMIUS_DIRS: &[&str] = &["Local Storage/leveldb", "IndexedDB"];

/// Static declaration of one catalog entry, compiled into an `EssentialFileSpec`.
struct CatalogEntry {
    id: &'static str,
    display_name: &'static str,
    root: &'static str,
    profile_dir_pattern: Option<&'static str>,
    pointer_files: &'static [&'static str],
    files: &'static [&'static str],
    patterns: &'static [&'static str],
    copy_dirs: &'static [&'static str],
    root_files: &'static [&'static str],
    markers: &'static [ProcessMarker],
    safe_storage: Option<SafeStorage>,
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        id: "chrome",
        display_name: "Google Chrome",
        root: ".config/google-chrome",
        profile_dir_pattern: None,
        pointer_files: &[],
        files: CHROMIUM_FILES,
        patterns: &[],
        copy_dirs: CHROMIUM_DIRS,
        root_files: &[],
        markers: &[ProcessMarker::Exact("chrome"), ProcessMarker::Contains("google-chrome")],
        safe_storage: Some(SafeStorage {
            application: "chrome",
            label: "Chrome Safe Storage",
        }),
    },
    CatalogEntry {
        id: "chromium",
        display_name: "Chromium",
        root: ".config/chromium",
        profile_dir_pattern: None,
        pointer_files: &[],
        files: CHROMIUM_FILES,
        patterns: &[],
        copy_dirs: CHROMIUM_DIRS,
        root_files: &[],
        markers: &[
            ProcessMarker::Exact("chromium"),
            ProcessMarker::Wrapped("chromium"),
            ProcessMarker::Contains("/chromium"),
        ],
        safe_storage: Some(SafeStorage {
            application: "chromium",
            label: "Chromium Safe Storage",
        }),
    },
    CatalogEntry {
        id: "brave",
        display_name: "Brave",
        root: ".config/BraveSoftware/Brave-Browser",
        profile_dir_pattern: None,
        pointer_files: &[],
        files: CHROMIUM_FILES,
        patterns: &[],
        copy_dirs: CHROMIUM_DIRS,
        root_files: &[],
        markers: &[ProcessMarker::Exact("brave"), ProcessMarker::Contains("brave-browser")],
        safe_storage: Some(SafeStorage {
            application: "brave",
            label: "Brave Safe Storage",
        }),
    },
    CatalogEntry {
        id: "firefox",
        display_name: "Firefox",
        root: ".mozilla/firefox",
        profile_dir_pattern: Some(r"^[A-Za-z0-9]+\.default(-[A-Za-z0-9-]+)?$"),
        pointer_files: &["installs.ini", "profiles.ini"],
        files: &[],
        patterns: FIREFOX_PATTERNS,
        copy_dirs: &[],
        root_files: &["profiles.ini", "installs.ini"],
        markers: &[
            ProcessMarker::Exact("firefox"),
            ProcessMarker::Exact("firefox-bin"),
            ProcessMarker::Wrapped("firefox"),
        ],
        safe_storage: None,
    },
    CatalogEntry {
        id: "termius",
        display_name: "Termius",
        root: ".config/Termius",
        profile_dir_pattern: None,
        pointer_files: &[],
        files: TERMIUS_FILES,
        patterns: &[],
        copy_dirs: TERMIUS_DIRS,
        root_files: &[],
        markers: &[
            ProcessMarker::Exact("termius-app"),
            ProcessMarker::Wrapped("termius-app"),
            ProcessMarker::Contains("/Termius/"),
        ],
        safe_storage: None,
    },
];

/// The compiled set of applications this engine knows how to back up.
#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<EssentialFileSpec>,
}

impl Catalog {
    /// Compile the built-in catalog. Patterns are validated here, once.
    pub fn builtin() -> Result<Self> {
        let specs = ENTRIES.iter().map(compile).collect::<Result<Vec<_>>>()?;
        Ok(Self { specs })
    }

    pub fn all(&self) -> &[EssentialFileSpec] {
        &self.specs
    }

    pub fn get(&self, id: &str) -> Option<&EssentialFileSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    /// Resolve a list of ids (in catalog order), or every entry when `ids` is `None`.
    ///
    /// Unknown ids are a configuration error.
    pub fn select(&self, ids: Option<&[String]>) -> Result<Vec<&EssentialFileSpec>> {
        let Some(ids) = ids else {
            return Ok(self.specs.iter().collect());
        };

        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            let known: Vec<&str> = self.specs.iter().map(|s| s.id.as_str()).collect();
            return Err(AppBackupError::ConfigInvalid {
                detail: format!("unknown application '{unknown}' (known: {})", known.join(", ")),
            });
        }

        Ok(self
            .specs
            .iter()
            .filter(|s| ids.iter().any(|id| id == &s.id))
            .collect())
    }
}

fn compile(entry: &CatalogEntry) -> Result<EssentialFileSpec> {
    let layout = match entry.profile_dir_pattern {
        Some(pattern) => ProfileLayout::Discovered {
            dir_pattern: Regex::new(pattern).map_err(|e| AppBackupError::ConfigInvalid {
                detail: format!("bad profile pattern for {}: {e}", entry.id),
            })?,
            pointer_files: entry.pointer_files.to_vec(),
        },
        None => ProfileLayout::Fixed,
    };

    let selection = if entry.patterns.is_empty() {
        FileSelection::Files(entry.files.iter().map(PathBuf::from).collect())
    } else {
        compile_patterns(entry.id, entry.patterns)?
    };

    Ok(EssentialFileSpec {
        id: entry.id.to_string(),
        display_name: entry.display_name.to_string(),
        root: PathBuf::from(entry.root),
        layout,
        selection,
        copy_dirs: entry.copy_dirs.iter().map(PathBuf::from).collect(),
        root_files: entry.root_files.iter().map(PathBuf::from).collect(),
        process_markers: entry.markers.to_vec(),
        safe_storage: entry.safe_storage.clone(),
    })
}

/// Compile glob patterns into a `FileSelection::Patterns`.
///
/// `*` does not cross directory separators.
pub fn compile_patterns(app: &str, patterns: &[&str]) -> Result<FileSelection> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| AppBackupError::ConfigInvalid {
                detail: format!("bad glob '{pattern}' for {app}: {e}"),
            })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| AppBackupError::ConfigInvalid {
        detail: format!("bad glob set for {app}: {e}"),
    })?;

    Ok(FileSelection::Patterns {
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        set,
    })
}
