use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::core::errors::{AppBackupError, Result};
use crate::core::models::run_log_entry::RunLogEntry;
use crate::core::traits::run_log::RunLogger;

/// Run logger that appends entries as JSON lines to a file.
///
/// Each line is one self-contained `RunLogEntry`, so concurrent readers
/// (`tail -f`, `jq`) never see half a record.
pub struct JsonRunLogger {
    log_path: PathBuf,
}

impl JsonRunLogger {
    pub fn new(log_path: &Path) -> Self {
        Self {
            log_path: log_path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Entries written by the most recent run, oldest first.
    ///
    /// Malformed lines are skipped; the log is diagnostic, not authoritative.
    pub fn last_run(&self) -> Result<Vec<RunLogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.log_path).map_err(|e| AppBackupError::RunLog {
            detail: format!("Cannot read run log: {e}"),
        })?;

        let mut entries: Vec<RunLogEntry> = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| AppBackupError::RunLog {
                detail: format!("Error reading run log: {e}"),
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(entry) = serde_json::from_str::<RunLogEntry>(trimmed) else {
                continue;
            };
            if entries.last().is_some_and(|last| last.run_id != entry.run_id) {
                entries.clear();
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl RunLogger for JsonRunLogger {
    fn log_step(&self, entry: &RunLogEntry) -> Result<()> {
        let line = serde_json::to_string(entry).map_err(|e| AppBackupError::RunLog {
            detail: format!("Failed to serialize run log entry: {e}"),
        })?;

        if let Some(parent) = self.log_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AppBackupError::RunLog {
                detail: format!("Cannot open run log at {}: {e}", self.log_path.display()),
            })?;

        writeln!(file, "{line}").map_err(|e| AppBackupError::RunLog {
            detail: format!("Failed to write run log entry: {e}"),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::run_log_entry::StepStatus;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(run_id: &str, step: &str, status: StepStatus) -> RunLogEntry {
        RunLogEntry {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            operation: "backup".to_string(),
            app: Some("chrome".to_string()),
            step: step.to_string(),
            status,
            detail: None,
        }
    }

    #[test]
    fn creates_parent_dirs_and_appends() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonRunLogger::new(&tmp.path().join("state/app-backup/run.log"));

        logger.log_step(&entry("r1", "archive", StepStatus::Ok)).unwrap();
        logger.log_step(&entry("r1", "encrypt", StepStatus::Ok)).unwrap();

        let content = fs::read_to_string(logger.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"status\":\"ok\""));
    }

    #[test]
    fn last_run_returns_only_latest_run() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonRunLogger::new(&tmp.path().join("run.log"));

        logger.log_step(&entry("r1", "archive", StepStatus::Ok)).unwrap();
        logger.log_step(&entry("r2", "archive", StepStatus::Failed)).unwrap();
        logger.log_step(&entry("r2", "encrypt", StepStatus::Skipped)).unwrap();

        let last = logger.last_run().unwrap();
        assert_eq!(last.len(), 2);
        assert!(last.iter().all(|e| e.run_id == "r2"));
        assert_eq!(last[0].status, StepStatus::Failed);
    }

    #[test]
    fn last_run_skips_malformed_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.log");
        fs::write(&path, "not json\n\n").unwrap();
        let logger = JsonRunLogger::new(&path);
        logger.log_step(&entry("r9", "archive", StepStatus::Ok)).unwrap();

        assert_eq!(logger.last_run().unwrap().len(), 1);
    }

    #[test]
    fn missing_log_is_empty() {
        let logger = JsonRunLogger::new(Path::new("/nonexistent/run.log"));
        assert!(logger.last_run().unwrap().is_empty());
    }
}
