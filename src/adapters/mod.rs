pub mod cipher;
pub mod exec;
pub mod git;
pub mod key_providers;
pub mod keyring;
pub mod process;
pub mod run_log;
pub mod secret_manager;
