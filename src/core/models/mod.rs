pub mod app_spec;
pub mod outcome;
pub mod restore_report;
pub mod run_log_entry;
