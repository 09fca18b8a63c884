//! Job and run-history store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use cronos_core::{timestamp, Job, JobId, LogRun, RunId};

use crate::atomic::{to_sorted_json, write_atomic};
use crate::error::StoreError;
use crate::layout::{LogPaths, StoreLayout};

/// Captured output of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLogs {
    pub stdout: String,
    pub stderr: String,
}

/// File-backed store for the jobs document, the run index and per-run logs.
///
/// Read-modify-write cycles on each document are serialized within the
/// process. Concurrent writers from other processes are not coordinated.
pub struct JobStore {
    layout: StoreLayout,
    jobs_lock: Mutex<()>,
    index_lock: Mutex<()>,
}

impl JobStore {
    /// Create a store rooted at `root` without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StoreLayout::new(root),
            jobs_lock: Mutex::new(()),
            index_lock: Mutex::new(()),
        }
    }

    /// Create a store and make sure its directories exist.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(root);
        store.ensure_directories().await?;
        debug!("JobStore initialized at {:?}", store.layout.root());
        Ok(store)
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub async fn ensure_directories(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.layout.runs_dir()).await?;
        Ok(())
    }

    /// Load every job. A missing document is an empty list.
    pub async fn load_jobs(&self) -> Result<Vec<Job>, StoreError> {
        read_document(&self.layout.jobs_file()).await
    }

    /// Replace the jobs document.
    pub async fn save_jobs(&self, jobs: &[Job]) -> Result<(), StoreError> {
        let _guard = self.jobs_lock.lock().await;
        let bytes = to_sorted_json(&jobs)?;
        write_atomic(&self.layout.jobs_file(), &bytes).await?;
        debug!("Saved {} job(s)", jobs.len());
        Ok(())
    }

    /// Set the last-run fields of one job.
    ///
    /// The document is re-read under the jobs lock and only that job's
    /// fields change, so edits made by another process since this one last
    /// loaded the document are kept. Returns `false` when the job is gone.
    pub async fn record_last_run(
        &self,
        job_id: &JobId,
        at: DateTime<Utc>,
        success: bool,
    ) -> Result<bool, StoreError> {
        let _guard = self.jobs_lock.lock().await;
        let path = self.layout.jobs_file();
        let mut jobs: Vec<Job> = read_document(&path).await?;
        let Some(job) = jobs.iter_mut().find(|job| job.id == *job_id) else {
            debug!(job_id = %job_id, "last run not recorded, job is gone");
            return Ok(false);
        };
        job.record_run(at, success);

        let bytes = to_sorted_json(&jobs)?;
        write_atomic(&path, &bytes).await?;
        Ok(true)
    }

    /// Load the whole run index from disk.
    pub async fn load_runs_index(&self) -> Result<Vec<LogRun>, StoreError> {
        read_document(&self.layout.index_file()).await
    }

    async fn save_runs_index(&self, runs: &[LogRun]) -> Result<(), StoreError> {
        let bytes = to_sorted_json(&runs)?;
        write_atomic(&self.layout.index_file(), &bytes).await
    }

    /// Append a new in-flight run for `job_id` and persist the index.
    pub async fn create_run(&self, job_id: JobId) -> Result<LogRun, StoreError> {
        let _guard = self.index_lock.lock().await;
        let mut runs = self.load_runs_index().await?;
        let run = LogRun::new(job_id);
        runs.push(run.clone());
        self.save_runs_index(&runs).await?;
        debug!("Created run {} for job {}", run.id, job_id);
        Ok(run)
    }

    /// Close out a run.
    ///
    /// Returns the stored record, or `None` when the run is no longer in the
    /// index (its job was deleted while it ran). That case is not an error.
    pub async fn complete_run(
        &self,
        run: &LogRun,
        exit_code: i32,
        success: bool,
    ) -> Result<Option<LogRun>, StoreError> {
        let _guard = self.index_lock.lock().await;
        let mut runs = self.load_runs_index().await?;
        let Some(stored) = runs.iter_mut().find(|r| r.id == run.id) else {
            debug!("Run {} no longer indexed, skipping completion", run.id);
            return Ok(None);
        };
        stored.complete(timestamp::now(), exit_code, success);
        let completed = stored.clone();
        self.save_runs_index(&runs).await?;
        Ok(Some(completed))
    }

    /// Runs of `job_id`, newest first.
    pub async fn runs_for(&self, job_id: &JobId) -> Result<Vec<LogRun>, StoreError> {
        let mut runs: Vec<LogRun> = self
            .load_runs_index()
            .await?
            .into_iter()
            .filter(|r| r.job_id == *job_id)
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    pub async fn latest_run(&self, job_id: &JobId) -> Result<Option<LogRun>, StoreError> {
        Ok(self.runs_for(job_id).await?.into_iter().next())
    }

    /// Look up a single run by id.
    pub async fn find_run(&self, run_id: &RunId) -> Result<Option<LogRun>, StoreError> {
        Ok(self
            .load_runs_index()
            .await?
            .into_iter()
            .find(|r| r.id == *run_id))
    }

    /// Delete every run of `job_id`: log files best-effort, then the index
    /// entries. Returns how many runs were removed.
    pub async fn delete_runs_for(&self, job_id: &JobId) -> Result<usize, StoreError> {
        let _guard = self.index_lock.lock().await;
        let runs = self.load_runs_index().await?;
        let (doomed, kept): (Vec<LogRun>, Vec<LogRun>) =
            runs.into_iter().partition(|r| r.job_id == *job_id);

        for run in &doomed {
            let paths = self.layout.run_logs(&run.id);
            remove_if_present(&paths.stdout).await;
            remove_if_present(&paths.stderr).await;
        }

        if !doomed.is_empty() {
            self.save_runs_index(&kept).await?;
            debug!("Deleted {} run(s) for job {}", doomed.len(), job_id);
        }
        Ok(doomed.len())
    }

    pub fn run_log_paths(&self, run_id: &RunId) -> LogPaths {
        self.layout.run_logs(run_id)
    }

    /// Read both log files of a run. Missing files read as empty.
    pub async fn read_run_log(&self, run_id: &RunId) -> Result<RunLogs, StoreError> {
        read_pair(&self.layout.run_logs(run_id)).await
    }

    pub fn legacy_log_paths(&self, job_id: &JobId) -> LogPaths {
        self.layout.legacy_logs(job_id)
    }

    /// Read the single pre-history log pair of a job. Missing files read as empty.
    pub async fn read_legacy_log(&self, job_id: &JobId) -> Result<RunLogs, StoreError> {
        read_pair(&self.layout.legacy_logs(job_id)).await
    }

    pub async fn delete_legacy_log(&self, job_id: &JobId) {
        let paths = self.layout.legacy_logs(job_id);
        remove_if_present(&paths.stdout).await;
        remove_if_present(&paths.stderr).await;
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

async fn read_pair(paths: &LogPaths) -> Result<RunLogs, StoreError> {
    Ok(RunLogs {
        stdout: read_text_or_empty(&paths.stdout).await?,
        stderr: read_text_or_empty(&paths.stderr).await?,
    })
}

async fn read_text_or_empty(path: &Path) -> Result<String, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
