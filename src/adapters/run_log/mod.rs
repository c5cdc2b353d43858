pub mod json_run_log;
