use crate::core::errors::Result;
use crate::core::models::run_log_entry::RunLogEntry;

/// Port for recording structured per-step run detail.
pub trait RunLogger: Send + Sync {
    /// Append an entry to the run log.
    fn log_step(&self, entry: &RunLogEntry) -> Result<()>;
}
