use std::path::PathBuf;

/// All domain errors for app-backup.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger. Run-level variants carry remediation
/// guidance in their message.
#[derive(Debug, thiserror::Error)]
pub enum AppBackupError {
    #[error(
        "Invalid configuration: {detail}\n\n  \
         Check your config file (default: ~/.config/app-backup/config.toml).\n  \
         Required: [encryption] recipient, plus identity_reference or identity_file."
    )]
    ConfigInvalid { detail: String },

    #[error(
        "Applications still running: {}\n\n  \
         Profiles of running applications change under our feet.\n\n  \
         Solutions:\n    \
         → Close the application(s) and try again\n    \
         → Or pass --force to continue anyway",
        apps.join(", ")
    )]
    AppsRunning { apps: Vec<String> },

    #[error("No essential files found for '{app}'")]
    NoFilesFound { app: String },

    #[error("Encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error(
        "Decryption failed: {reason}\n\n  \
         The identity key may not match the recipient the artifact was encrypted for,\n  \
         or the artifact is corrupt."
    )]
    DecryptionFailed { reason: String },

    #[error(
        "Secret manager unavailable: {reason}\n\n  \
         Solutions:\n    \
         → Unlock the secret manager (e.g. 'op signin') and try again\n    \
         → Or configure [encryption] identity_file instead"
    )]
    SecretUnavailable { reason: String },

    #[error(
        "Identity key not found at {path}\n\n  \
         Restore needs the age identity (private key) matching the configured recipient.\n  \
         Check [encryption] identity_file in your config."
    )]
    IdentityKeyNotFound { path: PathBuf },

    #[error(
        "Remote sync failed: {reason}\n\n  \
         Any local commit in the mirror is kept; retry the push later with\n  \
         'git -C <mirror> push'."
    )]
    TransportFailed { reason: String },

    #[error("Could not export safe storage key for '{app}': {reason}")]
    KeyExportFailed { app: String, reason: String },

    #[error("Could not import safe storage key for '{app}': {reason}")]
    KeyImportFailed { app: String, reason: String },

    #[error("Archive error: {reason}")]
    ArchiveFailed { reason: String },

    #[error(
        "No backup artifact found: {path}\n\n  \
         Run 'app-backup backup --push' on the source machine,\n  \
         then 'app-backup restore --pull' here."
    )]
    ArtifactNotFound { path: PathBuf },

    #[error("{failed} application(s) failed. See the run log at {log}")]
    PartialFailure { failed: usize, log: PathBuf },

    #[error("Run log error: {detail}")]
    RunLog { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppBackupError {
    /// Whether this error aborts the whole run rather than a single application.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. }
                | Self::AppsRunning { .. }
                | Self::SecretUnavailable { .. }
                | Self::IdentityKeyNotFound { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppBackupError>;
