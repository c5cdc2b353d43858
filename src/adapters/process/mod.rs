pub mod proc_table;
