use std::path::Path;

use colored::Colorize;

use crate::adapters::git::git_cli::GitCli;
use crate::adapters::key_providers;
use crate::adapters::run_log::json_run_log::JsonRunLogger;
use crate::adapters::secret_manager::op_cli::OnePasswordCli;
use crate::cli::output;
use crate::config::app_config::Config;
use crate::core::errors::Result;
use crate::core::models::run_log_entry::{RunLogEntry, StepStatus};
use crate::core::services::remote_sync::{RemoteState, RemoteSync, SyncStatus};

/// Execute the `app-backup status` command.
///
/// Read-only: shows the configuration in effect, what the mirror holds,
/// how it relates to the remote and how the last run went. Never
/// touches the secret manager.
pub fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;

    output::header("app-backup");
    print_config(&config);

    let git = GitCli::new();
    let status = RemoteSync::new(&git).status(&config.mirror)?;
    print_mirror(&status);

    print_last_run(&JsonRunLogger::new(&config.run_log))?;
    Ok(())
}

fn print_config(config: &Config) {
    let manager = OnePasswordCli::new();
    let keys = key_providers::for_source(&config.identity, &manager);

    output::detail("Recipient", &truncate_key(&config.recipient, 24));
    output::detail("Identity", &keys.describe());
    output::detail("Retention", &format!("{} snapshot(s)", config.retention));
    let apps = match &config.enabled_apps {
        Some(ids) => ids.join(", "),
        None => "all".to_string(),
    };
    output::detail("Apps", &apps);
}

fn print_mirror(status: &SyncStatus) {
    println!("\n{}", "  Mirror".bold());
    output::detail("Path", &status.mirror.display().to_string());
    output::detail("Remote", status.remote_url.as_deref().unwrap_or("(none)"));

    match &status.state {
        RemoteState::NoMirror => {
            output::warning("No mirror yet. Run 'app-backup backup' to create one.");
            return;
        }
        RemoteState::LocalOnly(reason) => {
            output::warning(&format!("Remote state unknown: {reason}"));
        }
        RemoteState::Tracking {
            branch,
            incoming,
            outgoing,
        } => {
            if incoming.is_empty() && outgoing.is_empty() {
                output::success(&format!("Up to date with {branch}"));
            }
            if !incoming.is_empty() {
                output::warning(&format!(
                    "{} commit(s) on {branch} not pulled yet (use restore --pull)",
                    incoming.len()
                ));
            }
            if !outgoing.is_empty() {
                output::warning(&format!(
                    "{} local commit(s) not pushed yet (use backup --push)",
                    outgoing.len()
                ));
            }
        }
    }

    if status.artifacts.is_empty() {
        output::warning("No artifacts in the mirror");
    }
    for artifact in &status.artifacts {
        output::detail(&artifact.name, &output::format_bytes(artifact.size_bytes));
    }
}

fn print_last_run(log: &JsonRunLogger) -> Result<()> {
    println!("\n{}", "  Last run".bold());

    let entries = log.last_run()?;
    let Some(first) = entries.first() else {
        output::warning(&format!("No runs logged at {}", log.path().display()));
        return Ok(());
    };

    output::detail(
        "Started",
        &format!(
            "{} ({})",
            first.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            first.operation
        ),
    );

    let failures = failed_steps(&entries);
    if failures.is_empty() {
        output::success("No failed steps");
    }
    for entry in failures {
        output::warning(&format!(
            "{} {}: {}",
            entry.app.as_deref().unwrap_or("-"),
            entry.step,
            entry.detail.as_deref().unwrap_or("failed")
        ));
    }
    Ok(())
}

fn failed_steps(entries: &[RunLogEntry]) -> Vec<&RunLogEntry> {
    entries
        .iter()
        .filter(|e| e.status == StepStatus::Failed)
        .collect()
}

/// Shorten a long key for display: `age1ql3z7h...mcac8p`.
fn truncate_key(key: &str, max_len: usize) -> String {
    if key.len() <= max_len {
        return key.to_string();
    }
    let tail = 6;
    let head = max_len.saturating_sub(tail + 3);
    format!("{}...{}", &key[..head], &key[key.len() - tail..])
}
