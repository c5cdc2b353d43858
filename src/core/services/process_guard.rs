use crate::core::errors::{AppBackupError, Result};
use crate::core::models::app_spec::{EssentialFileSpec, ProcessMarker};
use crate::core::traits::process_table::{ProcessInfo, ProcessTable};

/// Linux truncates `comm` to this many bytes.
const COMM_MAX_LEN: usize = 15;

/// Blocks backup/restore while a target application is running.
pub struct ProcessGuard<'a> {
    table: &'a dyn ProcessTable,
}

impl<'a> ProcessGuard<'a> {
    pub fn new(table: &'a dyn ProcessTable) -> Self {
        Self { table }
    }

    /// Ids of the given applications that currently have a matching process.
    pub fn check_running(&self, apps: &[&EssentialFileSpec]) -> Result<Vec<String>> {
        let processes = self.table.processes()?;
        Ok(apps
            .iter()
            .filter(|app| {
                processes
                    .iter()
                    .any(|p| app.process_markers.iter().any(|m| matches_marker(m, p)))
            })
            .map(|app| app.id.clone())
            .collect())
    }

    /// Fail with `AppsRunning` unless `force` is set.
    ///
    /// With `force`, returns the running ids so the caller can warn.
    pub fn enforce(&self, apps: &[&EssentialFileSpec], force: bool) -> Result<Vec<String>> {
        let running = self.check_running(apps)?;
        if !running.is_empty() && !force {
            return Err(AppBackupError::AppsRunning { apps: running });
        }
        if !running.is_empty() {
            tracing::warn!("continuing with running applications: {}", running.join(", "));
        }
        Ok(running)
    }
}

fn matches_marker(marker: &ProcessMarker, process: &ProcessInfo) -> bool {
    match marker {
        ProcessMarker::Exact(name) => comm_eq(&process.name, name),
        ProcessMarker::Contains(fragment) => process.cmdline.contains(fragment),
        ProcessMarker::Wrapped(name) => comm_eq(&process.name, &format!(".{name}-wrapped")),
    }
}

/// Compare a process name against a marker, allowing for kernel truncation.
fn comm_eq(comm: &str, expected: &str) -> bool {
    if expected.len() > COMM_MAX_LEN && comm.len() == COMM_MAX_LEN {
        expected.as_bytes().starts_with(comm.as_bytes())
    } else {
        comm == expected
    }
}
