pub mod archiver;
pub mod catalog;
pub mod encryption_service;
pub mod orchestrator;
pub mod process_guard;
pub mod profile_dir;
pub mod remote_sync;
pub mod restore_merger;
pub mod safe_storage;
pub mod scratch;
pub mod wipe;
