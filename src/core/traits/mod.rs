pub mod cipher;
pub mod git_transport;
pub mod key_provider;
pub mod keyring;
pub mod process_table;
pub mod run_log;
pub mod secret_manager;
