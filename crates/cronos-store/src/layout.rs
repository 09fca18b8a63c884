//! On-disk layout.

use std::path::{Path, PathBuf};

use cronos_core::run::{stderr_file_name, stdout_file_name};
use cronos_core::{JobId, RunId};

/// A stdout/stderr file pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

/// Paths under a storage root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs_file(&self) -> PathBuf {
        self.root.join("jobs.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn index_file(&self) -> PathBuf {
        self.logs_dir().join("index.json")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.logs_dir().join("runs")
    }

    /// Log files for one run, named after the run id.
    pub fn run_logs(&self, run_id: &RunId) -> LogPaths {
        let runs = self.runs_dir();
        LogPaths {
            stdout: runs.join(stdout_file_name(run_id)),
            stderr: runs.join(stderr_file_name(run_id)),
        }
    }

    /// Pre-run-history single log pair for a job.
    pub fn legacy_logs(&self, job_id: &JobId) -> LogPaths {
        let logs = self.logs_dir();
        LogPaths {
            stdout: logs.join(format!("{}.log", job_id)),
            stderr: logs.join(format!("{}.err", job_id)),
        }
    }
}
