use std::path::Path;

use crate::core::errors::Result;
use crate::core::models::outcome::Operation;
use crate::core::services::orchestrator::RestoreOptions;

/// Execute the `app-backup restore` command.
///
/// Live files are only overwritten after a snapshot of the changed ones
/// has been taken next to them.
pub fn execute(config_path: Option<&Path>, options: RestoreOptions) -> Result<()> {
    let config = super::load_config(config_path)?;
    let operation = Operation::Restore;
    super::run_pipeline(&config, operation, "Restoring profiles...", |orchestrator, scratch| {
        orchestrator.restore(&options, scratch)
    })
}
