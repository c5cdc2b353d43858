use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::errors::{AppBackupError, Result};

/// Default number of restore snapshots kept per profile.
pub const DEFAULT_RETENTION: usize = 3;

/// Mirror location relative to home.
const MIRROR_SUBDIR: &str = ".local/share/app-backup";

/// Mirror location used before app-backup covered more than browsers.
const LEGACY_MIRROR_SUBDIR: &str = ".local/share/browser-backup";

/// Run log location relative to home.
const RUN_LOG_SUBPATH: &str = ".local/state/app-backup/run.log";

/// Where the identity (private) key is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Secret-manager reference, e.g. `op://Private/age-key/private`.
    SecretManager(String),
    /// Local identity file.
    File(PathBuf),
}

/// Resolved operator settings, loaded once per invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub remote_url: Option<String>,
    pub mirror: PathBuf,
    pub recipient: String,
    pub identity: IdentitySource,
    pub retention: usize,
    /// Subset of catalog ids to process; `None` means every catalog entry.
    pub enabled_apps: Option<Vec<String>>,
    pub run_log: PathBuf,
    pub home: PathBuf,
    /// Non-fatal findings from validation, shown to the operator.
    pub warnings: Vec<String>,
}

impl Config {
    /// Default config file location (`~/.config/app-backup/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| AppBackupError::ConfigInvalid {
            detail: "Could not determine config directory".into(),
        })?;
        Ok(config_dir.join("app-backup").join("config.toml"))
    }

    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppBackupError::ConfigInvalid {
                detail: format!("{} not found", path.display()),
            });
        }
        let home = dirs::home_dir().ok_or_else(|| AppBackupError::ConfigInvalid {
            detail: "Could not determine home directory".into(),
        })?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &home)
    }

    /// Parse and validate TOML content, resolving `~` against `home`.
    pub fn parse(content: &str, home: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).map_err(|e| AppBackupError::ConfigInvalid {
            detail: format!("Failed to parse config: {e}"),
        })?;

        let mut warnings = Vec::new();

        let recipient = raw.encryption.recipient.trim().to_string();
        if recipient.is_empty() {
            return Err(AppBackupError::ConfigInvalid {
                detail: "[encryption] recipient is empty".into(),
            });
        }
        recipient
            .parse::<age::x25519::Recipient>()
            .map_err(|e: &str| AppBackupError::ConfigInvalid {
                detail: format!("[encryption] recipient '{recipient}' is not an age public key: {e}"),
            })?;

        let reference = non_empty(raw.encryption.identity_reference);
        let file = non_empty(raw.encryption.identity_file);
        let identity = match (reference, file) {
            (Some(reference), Some(file)) => {
                warnings.push(format!(
                    "Both identity_reference and identity_file are set; using the secret manager and ignoring {file}"
                ));
                IdentitySource::SecretManager(reference)
            }
            (Some(reference), None) => IdentitySource::SecretManager(reference),
            (None, Some(file)) => IdentitySource::File(expand_tilde(&file, home)),
            (None, None) => {
                return Err(AppBackupError::ConfigInvalid {
                    detail: "one of [encryption] identity_reference or identity_file is required"
                        .into(),
                });
            }
        };

        let remote = raw.remote.unwrap_or_default();
        let mirror = match non_empty(remote.mirror) {
            Some(m) => expand_tilde(&m, home),
            None => default_mirror(home),
        };

        let retention = raw
            .restore
            .and_then(|r| r.retention)
            .map(|r| r as usize)
            .unwrap_or(DEFAULT_RETENTION);

        let enabled_apps = raw.apps.and_then(|a| a.enabled);
        if let Some(apps) = &enabled_apps
            && apps.is_empty()
        {
            return Err(AppBackupError::ConfigInvalid {
                detail: "[apps] enabled is empty; remove it to process every application".into(),
            });
        }

        let run_log = raw
            .logging
            .and_then(|l| non_empty(l.run_log))
            .map(|p| expand_tilde(&p, home))
            .unwrap_or_else(|| home.join(RUN_LOG_SUBPATH));

        Ok(Self {
            remote_url: non_empty(remote.url),
            mirror,
            recipient,
            identity,
            retention,
            enabled_apps,
            run_log,
            home: home.to_path_buf(),
            warnings,
        })
    }

    /// Remote URL, required whenever a sync was requested.
    pub fn require_remote(&self) -> Result<&str> {
        self.remote_url
            .as_deref()
            .ok_or_else(|| AppBackupError::ConfigInvalid {
                detail: "[remote] url is required for --push / --pull".into(),
            })
    }
}

/// Expand a leading `~` or `~/` against `home`.
pub fn expand_tilde(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        home.to_path_buf()
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(raw)
    }
}

/// `~/.local/share/app-backup`, unless only the legacy browser-backup mirror exists.
pub fn default_mirror(home: &Path) -> PathBuf {
    let current = home.join(MIRROR_SUBDIR);
    let legacy = home.join(LEGACY_MIRROR_SUBDIR);
    if !current.join(".git").exists() && legacy.join(".git").exists() {
        legacy
    } else {
        current
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    remote: Option<RemoteSection>,
    encryption: EncryptionSection,
    restore: Option<RestoreSection>,
    apps: Option<AppsSection>,
    logging: Option<LoggingSection>,
}

/// The `[remote]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteSection {
    url: Option<String>,
    mirror: Option<String>,
}

/// The `[encryption]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EncryptionSection {
    recipient: String,
    identity_reference: Option<String>,
    identity_file: Option<String>,
}

/// The `[restore]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RestoreSection {
    retention: Option<u32>,
}

/// The `[apps]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppsSection {
    enabled: Option<Vec<String>>,
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingSection {
    run_log: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> String {
        age::x25519::Identity::generate().to_public().to_string()
    }

    fn home() -> PathBuf {
        PathBuf::from("/home/tester")
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let toml = format!(
            "[encryption]\nrecipient = \"{}\"\nidentity_file = \"~/.config/age/keys.txt\"\n",
            recipient()
        );
        let config = Config::parse(&toml, &home()).unwrap();

        assert_eq!(config.retention, DEFAULT_RETENTION);
        assert_eq!(
            config.identity,
            IdentitySource::File(PathBuf::from("/home/tester/.config/age/keys.txt"))
        );
        assert_eq!(config.mirror, PathBuf::from("/home/tester/.local/share/app-backup"));
        assert_eq!(
            config.run_log,
            PathBuf::from("/home/tester/.local/state/app-backup/run.log")
        );
        assert!(config.remote_url.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn both_identity_sources_prefer_secret_manager() {
        let toml = format!(
            "[encryption]\nrecipient = \"{}\"\nidentity_reference = \"op://Private/age/key\"\nidentity_file = \"/keys.txt\"\n",
            recipient()
        );
        let config = Config::parse(&toml, &home()).unwrap();

        assert_eq!(
            config.identity,
            IdentitySource::SecretManager("op://Private/age/key".into())
        );
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn missing_identity_source_is_invalid() {
        let toml = format!("[encryption]\nrecipient = \"{}\"\n", recipient());
        let err = Config::parse(&toml, &home()).unwrap_err();
        assert!(matches!(err, AppBackupError::ConfigInvalid { .. }));
    }

    #[test]
    fn blank_identity_values_count_as_missing() {
        let toml = format!(
            "[encryption]\nrecipient = \"{}\"\nidentity_reference = \"  \"\nidentity_file = \"\"\n",
            recipient()
        );
        assert!(Config::parse(&toml, &home()).is_err());
    }

    #[test]
    fn malformed_recipient_is_invalid() {
        let toml = "[encryption]\nrecipient = \"not-a-key\"\nidentity_file = \"/k\"\n";
        let err = Config::parse(toml, &home()).unwrap_err();
        assert!(err.to_string().contains("not an age public key"));
    }

    #[test]
    fn negative_retention_is_invalid() {
        let toml = format!(
            "[encryption]\nrecipient = \"{}\"\nidentity_file = \"/k\"\n[restore]\nretention = -1\n",
            recipient()
        );
        assert!(Config::parse(&toml, &home()).is_err());
    }

    #[test]
    fn full_config_round_trips_fields() {
        let toml = format!(
            r#"
[remote]
url = "git@example.com:me/profiles.git"
mirror = "~/mirror"

[encryption]
recipient = "{}"
identity_reference = "op://vault/item/field"

[restore]
retention = 0

[apps]
enabled = ["chrome", "firefox"]

[logging]
run_log = "/var/tmp/run.log"
"#,
            recipient()
        );
        let config = Config::parse(&toml, &home()).unwrap();

        assert_eq!(config.require_remote().unwrap(), "git@example.com:me/profiles.git");
        assert_eq!(config.mirror, PathBuf::from("/home/tester/mirror"));
        assert_eq!(config.retention, 0);
        assert_eq!(
            config.enabled_apps,
            Some(vec!["chrome".to_string(), "firefox".to_string()])
        );
        assert_eq!(config.run_log, PathBuf::from("/var/tmp/run.log"));
    }

    #[test]
    fn sync_without_remote_is_invalid() {
        let toml = format!(
            "[encryption]\nrecipient = \"{}\"\nidentity_file = \"/k\"\n",
            recipient()
        );
        let config = Config::parse(&toml, &home()).unwrap();
        assert!(config.require_remote().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = format!(
            "[encryption]\nrecipient = \"{}\"\nidentity_file = \"/k\"\nidentity = \"typo\"\n",
            recipient()
        );
        assert!(Config::parse(&toml, &home()).is_err());
    }

    #[test]
    fn legacy_mirror_used_when_only_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(LEGACY_MIRROR_SUBDIR).join(".git")).unwrap();
        assert_eq!(default_mirror(dir.path()), dir.path().join(LEGACY_MIRROR_SUBDIR));

        std::fs::create_dir_all(dir.path().join(MIRROR_SUBDIR).join(".git")).unwrap();
        assert_eq!(default_mirror(dir.path()), dir.path().join(MIRROR_SUBDIR));
    }

    #[test]
    fn tilde_expansion() {
        let home = home();
        assert_eq!(expand_tilde("~", &home), home);
        assert_eq!(expand_tilde("~/a/b", &home), home.join("a/b"));
        assert_eq!(expand_tilde("/abs", &home), PathBuf::from("/abs"));
        assert_eq!(expand_tilde("~other/x", &home), PathBuf::from("~other/x"));
    }
}
