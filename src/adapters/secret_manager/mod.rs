pub mod op_cli;
