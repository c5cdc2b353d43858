use std::path::Path;

use crate::core::errors::Result;
use crate::core::models::outcome::Operation;
use crate::core::services::orchestrator::BackupOptions;

/// Execute the `app-backup backup` command.
pub fn execute(config_path: Option<&Path>, options: BackupOptions) -> Result<()> {
    let config = super::load_config(config_path)?;
    let operation = Operation::Backup;
    super::run_pipeline(&config, operation, "Backing up profiles...", |orchestrator, scratch| {
        orchestrator.backup(&options, scratch)
    })
}
