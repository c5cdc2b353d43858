pub mod apps;
pub mod backup;
pub mod restore;
pub mod status;

use std::path::Path;

use crate::adapters::cipher::age_backend::AgeBackend;
use crate::adapters::git::git_cli::GitCli;
use crate::adapters::key_providers;
use crate::adapters::keyring::secret_tool::SecretToolKeyring;
use crate::adapters::process::proc_table::ProcTable;
use crate::adapters::run_log::json_run_log::JsonRunLogger;
use crate::adapters::secret_manager::op_cli::OnePasswordCli;
use crate::cli::context::{self, RunScratch};
use crate::cli::output;
use crate::config::app_config::Config;
use crate::core::errors::{AppBackupError, Result};
use crate::core::models::outcome::{Operation, RunSummary};
use crate::core::services::catalog::Catalog;
use crate::core::services::orchestrator::{Orchestrator, Ports};
use crate::core::services::scratch::Scratch;

/// Load the config file and print its validation warnings.
pub(crate) fn load_config(custom: Option<&Path>) -> Result<Config> {
    let path = context::config_path(custom)?;
    tracing::debug!("loading config from {}", path.display());
    let config = Config::load(&path)?;
    for warning in &config.warnings {
        output::warning(warning);
    }
    Ok(config)
}

/// Wire the production adapters and run one pipeline.
///
/// The summary is always printed, even for a run aborted before any
/// application; any failed application or sync error turns into
/// `PartialFailure` so the process exits non-zero.
pub(crate) fn run_pipeline<F>(
    config: &Config,
    operation: Operation,
    label: &str,
    pipeline: F,
) -> Result<()>
where
    F: FnOnce(&Orchestrator, &Scratch) -> Result<RunSummary>,
{
    let catalog = Catalog::builtin()?;
    let secret_manager = OnePasswordCli::new();
    let keys = key_providers::for_source(&config.identity, &secret_manager);
    let keyring = SecretToolKeyring::new();
    let processes = ProcTable::new();
    let git = GitCli::new();
    let run_log = JsonRunLogger::new(&config.run_log);

    let orchestrator = Orchestrator::new(
        config,
        &catalog,
        Ports {
            cipher: &AgeBackend,
            keys: keys.as_ref(),
            keyring: &keyring,
            processes: &processes,
            git: &git,
            run_log: &run_log,
        },
    );
    tracing::info!("run {} started", orchestrator.run_id());

    let scratch = RunScratch::create()?;
    let spinner = output::spinner(label);
    let result = pipeline(&orchestrator, &*scratch);
    spinner.finish_and_clear();
    drop(scratch);

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            output::summary(&aborted_summary(operation, &e), run_log.path());
            return Err(e);
        }
    };
    output::summary(&summary, run_log.path());

    if summary.is_success() {
        Ok(())
    } else {
        Err(AppBackupError::PartialFailure {
            failed: summary.failed_count(),
            log: run_log.path().to_path_buf(),
        })
    }
}

/// Summary for a run that stopped before processing any application.
fn aborted_summary(operation: Operation, err: &AppBackupError) -> RunSummary {
    let mut summary = RunSummary::new(operation);
    let reason = err.to_string().lines().next().unwrap_or_default().to_string();
    summary.notes.push(format!("aborted before any application was processed: {reason}"));
    summary
}
