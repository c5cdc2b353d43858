use std::path::Path;

use colored::Colorize;

use crate::adapters::process::proc_table::ProcTable;
use crate::cli::output;
use crate::core::errors::{AppBackupError, Result};
use crate::core::models::app_spec::{EssentialFileSpec, FileSelection};
use crate::core::services::catalog::Catalog;
use crate::core::services::process_guard::ProcessGuard;

/// Execute the `app-backup apps` command.
///
/// Works without a config file; enabled flags are only shown when one loads.
pub fn execute(config_path: Option<&Path>) -> Result<()> {
    let catalog = Catalog::builtin()?;
    let home = dirs::home_dir().ok_or_else(|| AppBackupError::ConfigInvalid {
        detail: "Could not determine home directory".into(),
    })?;

    let enabled = match super::load_config(config_path) {
        Ok(config) => config.enabled_apps,
        Err(e) => {
            tracing::debug!("apps listed without config: {e}");
            None
        }
    };

    let table = ProcTable::new();
    let all: Vec<&EssentialFileSpec> = catalog.all().iter().collect();
    let running = ProcessGuard::new(&table).check_running(&all).unwrap_or_else(|e| {
        output::warning(&format!("Could not read the process table: {e}"));
        Vec::new()
    });

    output::header("Supported applications");
    for spec in catalog.all() {
        let installed = home.join(&spec.root).is_dir();
        let is_enabled = enabled
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id == &spec.id));

        let mut flags = Vec::new();
        if installed {
            flags.push("installed".green().to_string());
        }
        if running.contains(&spec.id) {
            flags.push("running".yellow().to_string());
        }
        if !is_enabled {
            flags.push("disabled".dimmed().to_string());
        }

        println!(
            "  {:<10} {:<16} {:<34} {}",
            spec.id.cyan(),
            spec.display_name,
            format!("~/{}", spec.root.display()),
            flags.join(" ")
        );
        println!("  {:<10} {}", "", describe_selection(spec).dimmed());
    }
    Ok(())
}

fn describe_selection(spec: &EssentialFileSpec) -> String {
    let files = match &spec.selection {
        FileSelection::Files(files) => format!("{} file(s)", files.len()),
        FileSelection::Patterns { patterns, .. } => format!("{} pattern(s)", patterns.len()),
    };
    let mut parts = vec![files];
    if !spec.copy_dirs.is_empty() {
        parts.push(format!("{} dir(s)", spec.copy_dirs.len()));
    }
    if spec.safe_storage.is_some() {
        parts.push("safe storage key".into());
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_summary_mentions_safe_storage() {
        let catalog = Catalog::builtin().unwrap();
        let chrome = describe_selection(catalog.get("chrome").unwrap());
        assert!(chrome.contains("file(s)"));
        assert!(chrome.contains("safe storage key"));

        let firefox = describe_selection(catalog.get("firefox").unwrap());
        assert!(firefox.contains("pattern(s)"));
        assert!(!firefox.contains("safe storage"));
    }
}
