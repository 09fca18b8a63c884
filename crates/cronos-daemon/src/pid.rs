//! PID file guarding against a second daemon on the same storage root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::DaemonError;

/// PID file owned by the running daemon.
///
/// The file is removed on drop once it has been written by this process.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    locked: bool,
}

impl PidFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            locked: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the recorded PID, if the file exists.
    pub fn read_pid(&self) -> Result<Option<u32>, DaemonError> {
        if !self.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.read_error(e.to_string()))?;
        let pid = contents
            .trim()
            .parse::<u32>()
            .map_err(|e| self.read_error(format!("Invalid PID format: {}", e)))?;

        Ok(Some(pid))
    }

    /// PID of a live process recorded in the file.
    ///
    /// A missing file or a PID whose process has exited both yield `None`.
    pub fn running_pid(&self) -> Result<Option<u32>, DaemonError> {
        Ok(self.read_pid()?.filter(|pid| Self::is_process_running(*pid)))
    }

    /// Record the current process.
    pub fn write_pid(&mut self) -> Result<(), DaemonError> {
        self.write_pid_value(std::process::id())
    }

    pub fn write_pid_value(&mut self, pid: u32) -> Result<(), DaemonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DaemonError::PidFileCreation {
                path: self.path.clone(),
                reason: format!("Failed to create parent directory: {}", e),
            })?;
        }

        fs::write(&self.path, pid.to_string()).map_err(|e| DaemonError::PidFileCreation {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        self.locked = true;
        info!(path = %self.path.display(), pid, "PID file created");
        Ok(())
    }

    pub fn remove(&mut self) -> Result<(), DaemonError> {
        if !self.exists() {
            self.locked = false;
            return Ok(());
        }

        fs::remove_file(&self.path).map_err(|e| DaemonError::PidFileRemoval {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        self.locked = false;
        info!(path = %self.path.display(), "PID file removed");
        Ok(())
    }

    /// Check whether a process with the given PID exists.
    #[cfg(unix)]
    pub fn is_process_running(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        // Signal 0 performs the permission and existence checks only.
        kill(Pid::from_raw(raw), None).is_ok()
    }

    #[cfg(not(unix))]
    pub fn is_process_running(_pid: u32) -> bool {
        true
    }

    /// Take ownership of the PID file.
    ///
    /// A file left behind by a process that no longer exists is replaced.
    pub fn try_acquire(&mut self) -> Result<(), DaemonError> {
        if let Some(existing_pid) = self.read_pid()? {
            if Self::is_process_running(existing_pid) {
                return Err(DaemonError::AlreadyRunning {
                    path: self.path.clone(),
                    pid: existing_pid,
                });
            }

            warn!(
                path = %self.path.display(),
                pid = existing_pid,
                "removing stale PID file"
            );
            self.remove()?;
        }

        self.write_pid()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn read_error(&self, reason: String) -> DaemonError {
        DaemonError::PidFileRead {
            path: self.path.clone(),
            reason,
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.locked {
            if let Err(e) = self.remove() {
                warn!("Failed to remove PID file on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "pid_tests.rs"]
mod tests;
