use std::path::{Path, PathBuf};

use globset::GlobSet;
use regex::Regex;

/// How a running instance of an application shows up in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessMarker {
    /// Process name (`comm`) equals this value.
    Exact(&'static str),
    /// Full command line contains this substring.
    Contains(&'static str),
    /// Wrapped binary, e.g. `.firefox-wrapped` on NixOS.
    Wrapped(&'static str),
}

/// Keyring coordinates of a Chrome-class "safe storage" key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeStorage {
    /// Value of the `application` attribute in the keyring entry.
    pub application: &'static str,
    /// Human label used when (re)creating the entry.
    pub label: &'static str,
}

/// Where the essential files live below the application root.
#[derive(Debug, Clone)]
pub enum ProfileLayout {
    /// Files are addressed directly from the application root.
    Fixed,
    /// Files live in a per-install, randomly named profile directory.
    Discovered {
        /// Matches candidate profile directory names.
        dir_pattern: Regex,
        /// Ini files naming the active profile (`Path=` / `Default=`), in preference order.
        pointer_files: Vec<&'static str>,
    },
}

/// Which files of the profile are essential.
#[derive(Debug, Clone)]
pub enum FileSelection {
    /// Exact relative paths; missing ones are ignored.
    Files(Vec<PathBuf>),
    /// Glob patterns resolved against the profile directory.
    Patterns { patterns: Vec<String>, set: GlobSet },
}

/// Compiled, immutable description of one application's essential data.
#[derive(Debug, Clone)]
pub struct EssentialFileSpec {
    pub id: String,
    pub display_name: String,
    /// Application root, relative to the home directory.
    pub root: PathBuf,
    pub layout: ProfileLayout,
    pub selection: FileSelection,
    /// Directories copied recursively, relative to the profile directory.
    pub copy_dirs: Vec<PathBuf>,
    /// Files next to the profile directories (only meaningful for discovered layouts).
    pub root_files: Vec<PathBuf>,
    pub process_markers: Vec<ProcessMarker>,
    pub safe_storage: Option<SafeStorage>,
}

impl EssentialFileSpec {
    /// Deterministic artifact file name, e.g. `chrome-profile.tar.gz.age`.
    pub fn artifact_name(&self) -> String {
        format!("{}-profile.tar.gz.age", self.id)
    }

    /// Plaintext archive name used inside the scratch directory.
    pub fn archive_name(&self) -> String {
        format!("{}-profile.tar.gz", self.id)
    }

    /// Absolute application root for the given home directory.
    pub fn root_in(&self, home: &Path) -> PathBuf {
        home.join(&self.root)
    }

    pub fn has_discovered_profile(&self) -> bool {
        matches!(self.layout, ProfileLayout::Discovered { .. })
    }
}
