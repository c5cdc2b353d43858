use crate::core::errors::Result;

/// One entry of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Short process name (`comm`), possibly truncated by the kernel.
    pub name: String,
    /// Full command line, arguments joined by spaces.
    pub cmdline: String,
}

/// Read-only view of running processes.
pub trait ProcessTable: Send + Sync {
    fn processes(&self) -> Result<Vec<ProcessInfo>>;
}
