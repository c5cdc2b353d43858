//! Process-wide run context: config location and interrupt cleanup.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::app_config::Config;
use crate::core::errors::Result;
use crate::core::services::scratch::Scratch;
use crate::core::services::wipe;

/// Exit status after an interrupt, as a shell would report SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

/// Scratch directory of the run in progress, erased if we get interrupted.
static ACTIVE_SCRATCH: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Config file to load: the explicit path, or the default location.
pub fn config_path(custom: Option<&Path>) -> Result<PathBuf> {
    match custom {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path(),
    }
}

/// A `Scratch` registered for interrupt cleanup for as long as it lives.
pub struct RunScratch {
    scratch: Scratch,
}

impl RunScratch {
    pub fn create() -> Result<Self> {
        let scratch = Scratch::create()?;
        if let Ok(mut slot) = ACTIVE_SCRATCH.lock() {
            *slot = Some(scratch.path().to_path_buf());
        }
        tracing::debug!("scratch directory {}", scratch.path().display());
        Ok(Self { scratch })
    }
}

impl Deref for RunScratch {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.scratch
    }
}

impl Drop for RunScratch {
    fn drop(&mut self) {
        if let Ok(mut slot) = ACTIVE_SCRATCH.lock() {
            slot.take();
        }
    }
}

/// Erase the registered scratch directory and exit on SIGINT or SIGTERM.
///
/// Runs a single-threaded tokio runtime on a helper thread so the
/// blocking pipeline on the main thread stays untouched.
pub fn install_interrupt_handler() {
    let spawned = std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(|| {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("interrupt handler unavailable: {e}");
                    return;
                }
            };
            runtime.block_on(wait_for_signal());
            cleanup_active_scratch();
            eprintln!("\n  Interrupted; temporary files removed.");
            std::process::exit(INTERRUPTED_EXIT);
        });

    if let Err(e) = spawned {
        tracing::warn!("could not start interrupt handler: {e}");
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn cleanup_active_scratch() {
    let path = match ACTIVE_SCRATCH.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(path) = path
        && let Err(e) = wipe::erase_dir(&path)
    {
        eprintln!("  Could not remove {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    /// Both tests below use the process-wide slot.
    static SLOT: Mutex<()> = Mutex::new(());

    #[test]
    fn run_scratch_registers_and_unregisters() {
        let _slot = SLOT.lock().unwrap_or_else(|p| p.into_inner());
        let scratch = RunScratch::create().unwrap();
        let path = scratch.path().to_path_buf();
        assert_eq!(ACTIVE_SCRATCH.lock().unwrap().as_deref(), Some(path.as_path()));

        drop(scratch);
        assert!(ACTIVE_SCRATCH.lock().unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn interrupt_cleanup_erases_registered_scratch() {
        let _slot = SLOT.lock().unwrap_or_else(|p| p.into_inner());
        let scratch = RunScratch::create().unwrap();
        let path = scratch.path().to_path_buf();
        fs::write(path.join("Cookies"), b"plaintext").unwrap();

        cleanup_active_scratch();

        assert!(!path.exists());
        assert!(ACTIVE_SCRATCH.lock().unwrap().is_none());
        drop(scratch);
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = config_path(Some(Path::new("/etc/app-backup.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/etc/app-backup.toml"));
    }
}
