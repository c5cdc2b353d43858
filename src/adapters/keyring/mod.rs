pub mod secret_tool;
