//! Process lookup by pid
//!
//! Names are reported the way Task Manager's "Details" tab would minus the
//! extension: `chrome.exe` becomes `chrome`.

use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};

/// Name and executable of a running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub name: String,
    pub executable: Option<PathBuf>,
}

/// Reusable process table. Only the requested pid is refreshed per lookup.
pub struct ProcessLookup {
    system: System,
}

impl ProcessLookup {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Identify a process. Returns None for pid 0 or a process that has exited.
    pub fn identify(&mut self, pid: u32) -> Option<ProcessIdentity> {
        if pid == 0 {
            return None;
        }

        let pid = Pid::from_u32(pid);
        let refresh = ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet);
        if !self.system.refresh_process_specifics(pid, refresh) {
            tracing::debug!("Process {} not found", pid);
            return None;
        }

        let process = self.system.process(pid)?;
        let executable = process.exe().map(Path::to_path_buf);

        Some(ProcessIdentity {
            name: strip_exe_extension(process.name()).to_string(),
            executable,
        })
    }
}

impl Default for ProcessLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// `chrome.exe` -> `chrome`; other names are returned unchanged
pub fn strip_exe_extension(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}
