//! Daemon-related errors.

use std::path::PathBuf;

use cronos_config::ConfigError;
use cronos_core::JobId;
use cronos_store::StoreError;
use thiserror::Error;

/// Errors that can occur while orchestrating jobs or managing the daemon process.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// PID file already exists and daemon is running.
    #[error("Daemon already running (PID file: {path}, PID: {pid})")]
    AlreadyRunning { path: PathBuf, pid: u32 },

    /// Failed to create PID file.
    #[error("Failed to create PID file at {path}: {reason}")]
    PidFileCreation { path: PathBuf, reason: String },

    /// Failed to read PID file.
    #[error("Failed to read PID file at {path}: {reason}")]
    PidFileRead { path: PathBuf, reason: String },

    /// Failed to remove PID file.
    #[error("Failed to remove PID file at {path}: {reason}")]
    PidFileRemoval { path: PathBuf, reason: String },

    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// No job with this id.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// The coordinating task has exited.
    #[error("Job manager is not running")]
    ManagerStopped,

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic daemon error.
    #[error("{0}")]
    Custom(String),
}
