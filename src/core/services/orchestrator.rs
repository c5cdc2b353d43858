//! Backup and restore pipelines.
//!
//! Run-level errors (configuration, running applications, identity key)
//! abort before any application is touched. Anything else is scoped to
//! one application and recorded in the `RunSummary`.

use age::secrecy::SecretString;
use chrono::{Local, Utc};

use crate::config::app_config::Config;
use crate::core::errors::{AppBackupError, Result};
use crate::core::models::app_spec::{EssentialFileSpec, FileSelection};
use crate::core::models::outcome::{AppOutcome, Operation, RunSummary};
use crate::core::models::restore_report::RestoreReport;
use crate::core::models::run_log_entry::{RunLogEntry, StepStatus};
use crate::core::services::archiver::Archiver;
use crate::core::services::catalog::Catalog;
use crate::core::services::encryption_service::EncryptionService;
use crate::core::services::process_guard::ProcessGuard;
use crate::core::services::profile_dir::{self, MergePlan};
use crate::core::services::remote_sync::{self, PullOutcome, RemoteSync, StagedArtifact};
use crate::core::services::restore_merger::RestoreMerger;
use crate::core::services::safe_storage::{self, ImportResult, SafeStorageKeys};
use crate::core::services::scratch::Scratch;
use crate::core::services::wipe;
use crate::core::traits::cipher::CipherBackend;
use crate::core::traits::git_transport::GitTransport;
use crate::core::traits::key_provider::KeyProvider;
use crate::core::traits::keyring::Keyring;
use crate::core::traits::process_table::ProcessTable;
use crate::core::traits::run_log::RunLogger;

/// External collaborators of a run.
pub struct Ports<'a> {
    pub cipher: &'a dyn CipherBackend,
    pub keys: &'a dyn KeyProvider,
    pub keyring: &'a dyn Keyring,
    pub processes: &'a dyn ProcessTable,
    pub git: &'a dyn GitTransport,
    pub run_log: &'a dyn RunLogger,
}

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub force: bool,
    pub push: bool,
    /// Explicit app ids; `None` uses the configured set.
    pub apps: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub force: bool,
    pub pull: bool,
    pub apps: Option<Vec<String>>,
}

pub struct Orchestrator<'a> {
    config: &'a Config,
    catalog: &'a Catalog,
    ports: Ports<'a>,
    run_id: String,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, catalog: &'a Catalog, ports: Ports<'a>) -> Self {
        Self {
            config,
            catalog,
            ports,
            run_id: format!(
                "{}-{}",
                Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
                std::process::id()
            ),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// guard → export key → archive → encrypt → sync, per application.
    pub fn backup(&self, options: &BackupOptions, scratch: &Scratch) -> Result<RunSummary> {
        let mut summary = RunSummary::new(Operation::Backup);
        let apps = self.preflight(
            Operation::Backup,
            options.apps.as_deref(),
            options.force,
            options.push,
            &mut summary,
        )?;

        let mut artifacts = Vec::new();
        for spec in apps {
            self.log(Operation::Backup, Some(&spec.id), "backup", StepStatus::Started, None);
            match self.backup_app(spec, scratch) {
                Ok((artifact, files)) => {
                    artifacts.push(artifact);
                    let outcome = AppOutcome::Success(format!("{files} file(s) archived"));
                    self.finish_app(&mut summary, spec, outcome);
                }
                Err(AppBackupError::NoFilesFound { .. }) => {
                    let outcome = AppOutcome::Skipped("no essential files found".into());
                    self.finish_app(&mut summary, spec, outcome);
                }
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => self.finish_app(&mut summary, spec, AppOutcome::Failed(first_line(&e))),
            }
        }

        if !artifacts.is_empty() {
            self.sync_artifacts(options.push, &artifacts, &mut summary);
        }
        Ok(summary)
    }

    /// guard → identity → pull → decrypt → import key → merge → prune, per application.
    pub fn restore(&self, options: &RestoreOptions, scratch: &Scratch) -> Result<RunSummary> {
        let mut summary = RunSummary::new(Operation::Restore);
        let apps = self.preflight(
            Operation::Restore,
            options.apps.as_deref(),
            options.force,
            options.pull,
            &mut summary,
        )?;

        // No application can be restored without it, so fetch it before touching anything.
        let identity = self.ports.keys.identity_key().inspect_err(|e| {
            self.log(Operation::Restore, None, "identity", StepStatus::Failed, Some(first_line(e)));
        })?;
        self.log(
            Operation::Restore,
            None,
            "identity",
            StepStatus::Ok,
            Some(self.ports.keys.describe()),
        );

        if options.pull {
            self.pull(&mut summary)?;
        }

        for spec in apps {
            self.log(Operation::Restore, Some(&spec.id), "restore", StepStatus::Started, None);
            match self.restore_app(spec, scratch, &identity) {
                Ok(report) => {
                    let outcome = AppOutcome::Success(describe_restore(&report));
                    self.finish_app(&mut summary, spec, outcome);
                }
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => self.finish_app(&mut summary, spec, AppOutcome::Failed(first_line(&e))),
            }
        }
        Ok(summary)
    }

    /// Select applications, validate sync settings and run the process guard once.
    fn preflight(
        &self,
        operation: Operation,
        ids: Option<&[String]>,
        force: bool,
        sync: bool,
        summary: &mut RunSummary,
    ) -> Result<Vec<&'a EssentialFileSpec>> {
        let ids = ids.or(self.config.enabled_apps.as_deref());
        let apps = self.catalog.select(ids)?;
        if sync {
            self.config.require_remote()?;
        }

        let guard = ProcessGuard::new(self.ports.processes);
        let running = guard.enforce(&apps, force).inspect_err(|e| {
            self.log(operation, None, "process_guard", StepStatus::Failed, Some(first_line(e)));
        })?;
        if !running.is_empty() {
            let note = format!("forced while running: {}", running.join(", "));
            self.log(operation, None, "process_guard", StepStatus::Warning, Some(note.clone()));
            summary.notes.push(note);
        }
        Ok(apps)
    }

    fn backup_app(
        &self,
        spec: &EssentialFileSpec,
        scratch: &Scratch,
    ) -> Result<(StagedArtifact, usize)> {
        let archiver = Archiver;
        let root = spec.root_in(&self.config.home);
        let no_files = || AppBackupError::NoFilesFound {
            app: spec.id.clone(),
        };
        if !root.is_dir() {
            return Err(no_files());
        }

        let profile = profile_dir::resolve_local(&root, &spec.layout);
        if spec.has_discovered_profile() && profile.is_none() {
            return Err(no_files());
        }
        let profile_root = profile.as_ref().map_or_else(|| root.clone(), |d| root.join(d));

        let files = match &spec.selection {
            FileSelection::Files(list) => {
                archiver.resolve_listed(&profile_root, list, &spec.copy_dirs)?
            }
            FileSelection::Patterns { set, .. } => {
                let mut files = archiver.resolve_patterns(&profile_root, set)?;
                files.extend(archiver.resolve_listed(&profile_root, &[], &spec.copy_dirs)?);
                files.sort();
                files.dedup();
                files
            }
        };
        if files.is_empty() {
            return Err(no_files());
        }

        let staging = scratch.subdir(&format!("{}-staging", spec.id))?;
        let profile_staging = profile.as_ref().map_or_else(|| staging.clone(), |d| staging.join(d));
        archiver.stage(&profile_root, &files, &profile_staging)?;
        if profile.is_some() {
            let root_files = archiver.resolve_listed(&root, &spec.root_files, &[])?;
            archiver.stage(&root, &root_files, &staging)?;
        }
        self.log(
            Operation::Backup,
            Some(&spec.id),
            "stage",
            StepStatus::Ok,
            Some(format!("{} file(s) from {}", files.len(), profile_root.display())),
        );

        if let Some(storage) = &spec.safe_storage {
            match SafeStorageKeys::new(self.ports.keyring).export_key(&spec.id, storage) {
                Ok(Some(key)) => {
                    safe_storage::write_key_file(&staging, &key)?;
                    self.log(Operation::Backup, Some(&spec.id), "export_key", StepStatus::Ok, None);
                }
                Ok(None) => self.log(
                    Operation::Backup,
                    Some(&spec.id),
                    "export_key",
                    StepStatus::Skipped,
                    Some("no safe storage key in keyring".into()),
                ),
                Err(e) => {
                    tracing::warn!("{e}");
                    self.log(
                        Operation::Backup,
                        Some(&spec.id),
                        "export_key",
                        StepStatus::Warning,
                        Some(first_line(&e)),
                    );
                }
            }
        }

        let archive = archiver.build(&staging, &scratch.path().join(spec.archive_name()))?;
        wipe::erase_dir(&staging)?;
        self.log(
            Operation::Backup,
            Some(&spec.id),
            "archive",
            StepStatus::Ok,
            Some(format!("{} entries, sha256 {}", archive.entries, archive.sha256)),
        );

        let digest = remote_sync::artifact_digest(&self.config.recipient, &archive.sha256)?;
        let artifact_path = scratch.path().join(spec.artifact_name());
        EncryptionService::new(self.ports.cipher).encrypt_file(
            &archive.path,
            &self.config.recipient,
            &artifact_path,
        )?;
        self.log(Operation::Backup, Some(&spec.id), "encrypt", StepStatus::Ok, None);

        Ok((
            StagedArtifact {
                app: spec.id.clone(),
                name: spec.artifact_name(),
                path: artifact_path,
                digest,
            },
            files.len(),
        ))
    }

    fn sync_artifacts(&self, push: bool, artifacts: &[StagedArtifact], summary: &mut RunSummary) {
        let sync = RemoteSync::new(self.ports.git);
        let mirror = &self.config.mirror;

        if !push {
            match sync.stage_local(mirror, artifacts) {
                Ok(changed) => {
                    let note = format!(
                        "{} updated file(s) in {} (not committed, use --push)",
                        changed.len(),
                        mirror.display()
                    );
                    let detail = Some(note.clone());
                    self.log(Operation::Backup, None, "stage_local", StepStatus::Ok, detail);
                    summary.notes.push(note);
                }
                Err(e) => self.sync_failed(Operation::Backup, "stage_local", e, summary),
            }
            return;
        }

        let Some(url) = self.config.remote_url.as_deref() else {
            return;
        };
        match sync.push(mirror, url, artifacts) {
            Ok(report) => {
                if !report.lfs_added.is_empty() {
                    summary
                        .notes
                        .push(format!("stored via git LFS: {}", report.lfs_added.join(", ")));
                }
                let detail = match (report.committed, report.pushed) {
                    (false, false) => "artifacts unchanged, nothing to commit".to_string(),
                    (true, true) => "committed and pushed".to_string(),
                    (false, true) => "pushed earlier local commit".to_string(),
                    (true, false) => "committed locally".to_string(),
                };
                self.log(Operation::Backup, None, "push", StepStatus::Ok, Some(detail.clone()));
                summary.notes.push(detail);

                if let Some(reason) = report.push_error {
                    let err = AppBackupError::TransportFailed { reason };
                    self.sync_failed(Operation::Backup, "push", err, summary);
                }
            }
            Err(e) => self.sync_failed(Operation::Backup, "push", e, summary),
        }
    }

    fn pull(&self, summary: &mut RunSummary) -> Result<()> {
        let url = self.config.require_remote()?;
        match RemoteSync::new(self.ports.git).pull(&self.config.mirror, url) {
            Ok(PullOutcome::RemoteUnavailable(reason)) => {
                let note = format!("remote unavailable, using local mirror: {reason}");
                tracing::warn!("{note}");
                self.log(Operation::Restore, None, "pull", StepStatus::Warning, Some(note.clone()));
                summary.notes.push(note);
            }
            Ok(outcome) => {
                let detail = if outcome == PullOutcome::Cloned {
                    "cloned mirror"
                } else {
                    "mirror updated"
                };
                self.log(Operation::Restore, None, "pull", StepStatus::Ok, Some(detail.into()));
            }
            Err(e) => self.sync_failed(Operation::Restore, "pull", e, summary),
        }
        Ok(())
    }

    fn sync_failed(
        &self,
        operation: Operation,
        step: &str,
        err: AppBackupError,
        summary: &mut RunSummary,
    ) {
        tracing::warn!("{step} failed: {err}");
        self.log(operation, None, step, StepStatus::Failed, Some(first_line(&err)));
        summary.sync_error = Some(first_line(&err));
    }

    fn restore_app(
        &self,
        spec: &EssentialFileSpec,
        scratch: &Scratch,
        identity: &SecretString,
    ) -> Result<RestoreReport> {
        let artifact = self.config.mirror.join(spec.artifact_name());
        let archive = scratch.path().join(spec.archive_name());
        EncryptionService::new(self.ports.cipher).decrypt_file(&artifact, identity, &archive)?;
        self.log(Operation::Restore, Some(&spec.id), "decrypt", StepStatus::Ok, None);

        let extracted = scratch.subdir(&format!("{}-restore", spec.id))?;
        let extract_result = Archiver.extract(&archive, &extracted);
        wipe::secure_erase(&archive)?;
        let count = extract_result?;
        self.log(
            Operation::Restore,
            Some(&spec.id),
            "extract",
            StepStatus::Ok,
            Some(format!("{count} file(s)")),
        );

        // The key must be in place before the application next reads its cookies.
        let key_imported = match safe_storage::take_key_file(&extracted)? {
            Some(key) => self.import_key(spec, &key),
            None => false,
        };

        let root = spec.root_in(&self.config.home);
        let plan = if spec.has_discovered_profile() {
            profile_dir::plan_merge(&extracted, &root, &spec.layout)
        } else {
            MergePlan {
                source: extracted.clone(),
                target: root,
            }
        };

        let merger = RestoreMerger::new(self.config.retention);
        let merged = merger.merge(&plan.source, &plan.target, Local::now());
        wipe::erase_dir(&extracted)?;
        let mut report = merged?;
        report.key_imported = key_imported;

        self.log(
            Operation::Restore,
            Some(&spec.id),
            "merge",
            StepStatus::Ok,
            Some(format!(
                "{} merged, {} snapshotted, {} pruned",
                report.files_merged,
                report.files_snapshotted,
                report.pruned.len()
            )),
        );
        Ok(report)
    }

    /// Install the archived safe storage key. Failures only warn.
    fn import_key(&self, spec: &EssentialFileSpec, key: &SecretString) -> bool {
        let Some(storage) = &spec.safe_storage else {
            return false;
        };
        match SafeStorageKeys::new(self.ports.keyring).import_key(&spec.id, storage, key) {
            Ok(ImportResult::Replaced) => {
                self.log(Operation::Restore, Some(&spec.id), "import_key", StepStatus::Ok, None);
                true
            }
            Ok(ImportResult::Unchanged) => {
                self.log(
                    Operation::Restore,
                    Some(&spec.id),
                    "import_key",
                    StepStatus::Skipped,
                    Some("keyring already holds this key".into()),
                );
                false
            }
            Err(e) => {
                tracing::warn!("{e}");
                self.log(
                    Operation::Restore,
                    Some(&spec.id),
                    "import_key",
                    StepStatus::Warning,
                    Some(first_line(&e)),
                );
                false
            }
        }
    }

    fn finish_app(&self, summary: &mut RunSummary, spec: &EssentialFileSpec, outcome: AppOutcome) {
        let status = match &outcome {
            AppOutcome::Success(_) => StepStatus::Ok,
            AppOutcome::Skipped(_) => StepStatus::Skipped,
            AppOutcome::Failed(_) => StepStatus::Failed,
        };
        let step = summary.operation.to_string();
        let detail = Some(outcome.detail().to_string());
        self.log(summary.operation, Some(&spec.id), &step, status, detail);
        summary.record(&spec.id, outcome);
    }

    fn log(
        &self,
        operation: Operation,
        app: Option<&str>,
        step: &str,
        status: StepStatus,
        detail: Option<String>,
    ) {
        let entry = RunLogEntry {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            operation: operation.to_string(),
            app: app.map(str::to_string),
            step: step.to_string(),
            status,
            detail,
        };
        if let Err(e) = self.ports.run_log.log_step(&entry) {
            tracing::warn!("run log: {e}");
        }
    }
}

fn first_line(err: &AppBackupError) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}

fn describe_restore(report: &RestoreReport) -> String {
    let mut detail = format!("{} file(s) merged", report.files_merged);
    if let Some(snapshot) = &report.snapshot {
        let name = snapshot
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        detail.push_str(&format!(", {} saved to {name}", report.files_snapshotted));
    }
    if report.key_imported {
        detail.push_str(", key imported");
    }
    detail
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use age::secrecy::ExposeSecret;

    use super::*;
    use crate::adapters::cipher::age_backend::AgeBackend;
    use crate::adapters::key_providers::file_key::FileKeyProvider;
    use crate::config::app_config::IdentitySource;
    use crate::core::services::process_guard::tests::FakeProcessTable;
    use crate::core::services::remote_sync::tests::FakeGit;
    use crate::core::services::safe_storage::tests::FakeKeyring;

    #[derive(Default)]
    struct MemoryRunLog(Mutex<Vec<RunLogEntry>>);

    impl RunLogger for MemoryRunLog {
        fn log_step(&self, entry: &RunLogEntry) -> Result<()> {
            self.0.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    struct Fixture {
        tmp: tempfile::TempDir,
        recipient: String,
        key_file: PathBuf,
        catalog: Catalog,
        keyring: FakeKeyring,
        git: FakeGit,
        run_log: MemoryRunLog,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let identity = age::x25519::Identity::generate();
            let key_file = tmp.path().join("keys.txt");
            fs::write(&key_file, format!("{}\n", identity.to_string().expose_secret())).unwrap();
            Self {
                recipient: identity.to_public().to_string(),
                key_file,
                catalog: Catalog::builtin().unwrap(),
                keyring: FakeKeyring::with_chrome_key("chrome-key-1"),
                git: FakeGit::default(),
                run_log: MemoryRunLog::default(),
                tmp,
            }
        }

        fn home(&self, name: &str) -> PathBuf {
            self.tmp.path().join(name)
        }

        fn config(&self, home: &Path, retention: usize) -> Config {
            Config {
                remote_url: Some("git@example.com:me/profiles.git".into()),
                mirror: self.tmp.path().join("mirror"),
                recipient: self.recipient.clone(),
                identity: IdentitySource::File(self.key_file.clone()),
                retention,
                enabled_apps: None,
                run_log: self.tmp.path().join("run.log"),
                home: home.to_path_buf(),
                warnings: Vec::new(),
            }
        }

        fn run<T>(
            &self,
            config: &Config,
            processes: &FakeProcessTable,
            f: impl FnOnce(&Orchestrator, &Scratch) -> T,
        ) -> T {
            let cipher = AgeBackend;
            let keys = FileKeyProvider::new(self.key_file.clone());
            let ports = Ports {
                cipher: &cipher,
                keys: &keys,
                keyring: &self.keyring,
                processes,
                git: &self.git,
                run_log: &self.run_log,
            };
            let orchestrator = Orchestrator::new(config, &self.catalog, ports);
            let scratch = Scratch::create().unwrap();
            f(&orchestrator, &scratch)
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn idle() -> FakeProcessTable {
        FakeProcessTable::with(&[("bash", "-bash")])
    }

    #[test]
    fn guard_blocks_backup_without_side_effects() {
        let fx = Fixture::new();
        let home = fx.home("home");
        write(&home.join(".config/google-chrome/Default/Cookies"), "c");
        let config = fx.config(&home, 3);
        let running = FakeProcessTable::with(&[("chrome", "/opt/google/chrome/chrome")]);

        let err = fx
            .run(&config, &running, |o, s| o.backup(&BackupOptions::default(), s))
            .unwrap_err();

        assert!(matches!(err, AppBackupError::AppsRunning { .. }));
        assert!(!config.mirror.exists());
        assert!(fx.git.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn forced_backup_proceeds_with_warning() {
        let fx = Fixture::new();
        let home = fx.home("home");
        write(&home.join(".config/google-chrome/Default/Cookies"), "c");
        let config = fx.config(&home, 3);
        let running = FakeProcessTable::with(&[("chrome", "/opt/google/chrome/chrome")]);

        let options = BackupOptions {
            force: true,
            ..Default::default()
        };
        let summary = fx.run(&config, &running, |o, s| o.backup(&options, s)).unwrap();

        assert!(summary.notes.iter().any(|n| n.contains("forced while running: chrome")));
        assert_eq!(summary.outcome("chrome").map(|o| o.label()), Some("ok"));
        assert!(config.mirror.join("chrome-profile.tar.gz.age").exists());
    }

    #[test]
    fn backup_skips_missing_apps_and_restore_round_trips() {
        let fx = Fixture::new();
        let home = fx.home("home");
        let chrome = home.join(".config/google-chrome");
        write(&chrome.join("Default/Cookies"), "cookies v1");
        write(&chrome.join("Default/Preferences"), "{\"prefs\":1}");
        write(&chrome.join("Default/History"), "not essential");
        let config = fx.config(&home, 3);

        let summary = fx
            .run(&config, &idle(), |o, s| o.backup(&BackupOptions::default(), s))
            .unwrap();
        assert!(summary.is_success());
        assert_eq!(
            summary.outcome("chrome"),
            Some(&AppOutcome::Success("2 file(s) archived".into()))
        );
        assert_eq!(summary.outcome("firefox").map(|o| o.label()), Some("skipped"));
        assert!(!config.mirror.join("firefox-profile.tar.gz.age").exists());

        // Local drift after the backup.
        write(&chrome.join("Default/Cookies"), "cookies v2");
        fx.keyring.entries.lock().unwrap().clear();
        fx.keyring.entries.lock().unwrap().insert(
            format!("{}|application=chrome", crate::core::services::catalog::CHROME_KEYRING_SCHEMA),
            "other-key".into(),
        );

        let options = RestoreOptions {
            apps: Some(vec!["chrome".into()]),
            ..Default::default()
        };
        let summary = fx.run(&config, &idle(), |o, s| o.restore(&options, s)).unwrap();
        assert!(summary.is_success(), "{summary:?}");

        assert_eq!(fs::read_to_string(chrome.join("Default/Cookies")).unwrap(), "cookies v1");
        assert_eq!(fs::read_to_string(chrome.join("Default/History")).unwrap(), "not essential");
        assert!(!chrome.join(safe_storage::KEY_FILE_NAME).exists());
        assert_eq!(fx.keyring.chrome_key().as_deref(), Some("chrome-key-1"));

        let snapshots = crate::core::services::restore_merger::list_snapshots(&chrome).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(
            fs::read_to_string(snapshots[0].2.join("Default/Cookies")).unwrap(),
            "cookies v2"
        );
    }

    #[test]
    fn rotated_recipient_re_encrypts_unchanged_profile() {
        let fx = Fixture::new();
        let home = fx.home("home");
        write(&home.join(".config/Termius/Cookies"), "session");
        let only_termius = BackupOptions {
            apps: Some(vec!["termius".into()]),
            ..Default::default()
        };

        let config = fx.config(&home, 3);
        fx.run(&config, &idle(), |o, s| o.backup(&only_termius, s)).unwrap();

        let rotated = age::x25519::Identity::generate();
        let rotated_config = Config {
            recipient: rotated.to_public().to_string(),
            ..fx.config(&home, 3)
        };
        let summary = fx
            .run(&rotated_config, &idle(), |o, s| o.backup(&only_termius, s))
            .unwrap();
        assert!(summary.notes.iter().any(|n| n.starts_with("2 updated file(s)")), "{summary:?}");

        let identity = SecretString::from(format!("{}\n", rotated.to_string().expose_secret()));
        let archive = fx.tmp.path().join("termius.tar.gz");
        EncryptionService::new(&AgeBackend)
            .decrypt_file(
                &rotated_config.mirror.join("termius-profile.tar.gz.age"),
                &identity,
                &archive,
            )
            .unwrap();
        let extracted = fx.tmp.path().join("extracted");
        Archiver.extract(&archive, &extracted).unwrap();
        assert_eq!(fs::read_to_string(extracted.join("Cookies")).unwrap(), "session");
    }

    #[test]
    fn firefox_restores_into_local_profile_name() {
        let fx = Fixture::new();
        let source_home = fx.home("laptop");
        let firefox = source_home.join(".mozilla/firefox");
        write(&firefox.join("abc123.default/cookies.sqlite"), "laptop cookies");
        write(&firefox.join("abc123.default/logins.json"), "{}");
        write(&firefox.join("profiles.ini"), "[Profile0]\nPath=abc123.default\nDefault=1\n");

        let only_firefox = Some(vec!["firefox".to_string()]);
        let backup = BackupOptions {
            apps: only_firefox.clone(),
            ..Default::default()
        };
        let source_config = fx.config(&source_home, 3);
        fx.run(&source_config, &idle(), |o, s| o.backup(&backup, s)).unwrap();

        let target_home = fx.home("desktop");
        let local = target_home.join(".mozilla/firefox");
        write(&local.join("xyz789.default/cookies.sqlite"), "desktop cookies");
        write(&local.join("profiles.ini"), "[Profile0]\nPath=xyz789.default\nDefault=1\n");

        let restore = RestoreOptions {
            apps: only_firefox,
            ..Default::default()
        };
        let target_config = fx.config(&target_home, 3);
        let summary = fx.run(&target_config, &idle(), |o, s| o.restore(&restore, s)).unwrap();
        assert!(summary.is_success(), "{summary:?}");

        assert_eq!(
            fs::read_to_string(local.join("xyz789.default/cookies.sqlite")).unwrap(),
            "laptop cookies"
        );
        assert!(local.join("xyz789.default/logins.json").exists());
        assert!(!local.join("abc123.default").exists());
        assert_eq!(
            fs::read_to_string(local.join("profiles.ini")).unwrap(),
            "[Profile0]\nPath=xyz789.default\nDefault=1\n"
        );
    }

    #[test]
    fn missing_artifact_fails_only_that_app() {
        let fx = Fixture::new();
        let home = fx.home("home");
        write(&home.join(".config/Termius/Local Storage/leveldb/000003.log"), "hosts");
        let config = fx.config(&home, 3);
        let backup = BackupOptions {
            apps: Some(vec!["termius".into()]),
            ..Default::default()
        };
        fx.run(&config, &idle(), |o, s| o.backup(&backup, s)).unwrap();

        let restore = RestoreOptions {
            apps: Some(vec!["chrome".into(), "termius".into()]),
            ..Default::default()
        };
        let summary = fx.run(&config, &idle(), |o, s| o.restore(&restore, s)).unwrap();

        assert_eq!(summary.failed_count(), 1);
        assert!(summary.outcome("chrome").unwrap().is_failure());
        assert_eq!(summary.outcome("termius").map(|o| o.label()), Some("ok"));
    }

    #[test]
    fn missing_identity_aborts_restore_before_any_app() {
        let fx = Fixture::new();
        let home = fx.home("home");
        let config = fx.config(&home, 3);
        fs::remove_file(&fx.key_file).unwrap();

        let err = fx
            .run(&config, &idle(), |o, s| o.restore(&RestoreOptions::default(), s))
            .unwrap_err();
        assert!(matches!(err, AppBackupError::IdentityKeyNotFound { .. }));
        assert!(fx
            .run_log
            .0
            .lock()
            .unwrap()
            .iter()
            .all(|e| e.app.is_none()));
    }

    #[test]
    fn push_commits_once_for_unchanged_profile() {
        let fx = Fixture::new();
        let home = fx.home("home");
        write(&home.join(".config/chromium/Local State"), "{}");
        let config = fx.config(&home, 3);
        let options = BackupOptions {
            push: true,
            apps: Some(vec!["chromium".into()]),
            ..Default::default()
        };

        let first = fx.run(&config, &idle(), |o, s| o.backup(&options, s)).unwrap();
        assert!(first.notes.contains(&"committed and pushed".to_string()));

        let second = fx.run(&config, &idle(), |o, s| o.backup(&options, s)).unwrap();
        assert!(second
            .notes
            .contains(&"artifacts unchanged, nothing to commit".to_string()));
        assert_eq!(*fx.git.commits.lock().unwrap(), 1);
    }

    #[test]
    fn push_without_remote_is_config_error() {
        let fx = Fixture::new();
        let home = fx.home("home");
        let mut config = fx.config(&home, 3);
        config.remote_url = None;
        let options = BackupOptions {
            push: true,
            ..Default::default()
        };
        let err = fx.run(&config, &idle(), |o, s| o.backup(&options, s)).unwrap_err();
        assert!(matches!(err, AppBackupError::ConfigInvalid { .. }));
    }
}
