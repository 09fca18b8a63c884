//! Runner errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The process could not be started: missing shell, permission denied or
    /// a working directory that does not exist.
    #[error("Failed to launch {shell}: {reason}")]
    Launch { shell: PathBuf, reason: String },

    /// A log file could not be created.
    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error while supervising a running process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn is_launch(&self) -> bool {
        matches!(self, RunnerError::Launch { .. })
    }
}
