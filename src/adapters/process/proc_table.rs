use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::Result;
use crate::core::traits::process_table::{ProcessInfo, ProcessTable};

/// Process table read from a procfs mount.
pub struct ProcTable {
    root: PathBuf,
}

impl ProcTable {
    pub fn new() -> Self {
        Self::at("/proc")
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_process(dir: &Path, pid: u32) -> Option<ProcessInfo> {
        // Processes can exit between listing and reading.
        let name = fs::read_to_string(dir.join("comm")).ok()?;
        let cmdline = fs::read(dir.join("cmdline")).unwrap_or_default();
        let cmdline = cmdline
            .split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        Some(ProcessInfo {
            pid,
            name: name.trim_end().to_string(),
            cmdline,
        })
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for ProcTable {
    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let mut processes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };
            if let Some(info) = Self::read_process(&entry.path(), pid) {
                processes.push(info);
            }
        }
        Ok(processes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fake_procfs() {
        let dir = tempfile::tempdir().unwrap();
        let pid = dir.path().join("4242");
        fs::create_dir(&pid).unwrap();
        fs::write(pid.join("comm"), "firefox\n").unwrap();
        fs::write(pid.join("cmdline"), b"/usr/lib/firefox/firefox\0-P\0default\0").unwrap();
        fs::create_dir(dir.path().join("self")).unwrap();
        fs::create_dir(dir.path().join("77")).unwrap();

        let processes = ProcTable::at(dir.path()).processes().unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].pid, 4242);
        assert_eq!(processes[0].name, "firefox");
        assert_eq!(processes[0].cmdline, "/usr/lib/firefox/firefox -P default");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn lists_live_processes() {
        let processes = ProcTable::new().processes().unwrap();
        assert!(processes.iter().any(|p| p.pid == std::process::id()));
    }
}
