//! One run of one job outside the coordinating task.
//!
//! Used by `cronos job run` while a daemon may be running. Nothing is
//! scheduled and the jobs document is never rewritten from a snapshot: only
//! the job's last-run fields are updated, against a fresh read.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use cronos_core::{timestamp, ExecutionSettings, Job, LogRun};
use cronos_runner::{OutputChunk, OutputStream, ProcessRunner, RunOutcome, RunRequest};
use cronos_store::JobStore;

use crate::error::DaemonError;
use crate::manager::LiveOutput;
use crate::notify::{JobNotification, NotificationSink};

const LIVE_CHANNEL_CAPACITY: usize = 64;

/// Result of [`run_once`].
#[derive(Debug, Clone)]
pub struct SingleRun {
    /// The completed run record.
    pub run: LogRun,
    /// Set when the process could not be started.
    pub launch_error: Option<String>,
    /// `false` when the job was deleted from the document during the run.
    pub recorded: bool,
}

/// Materialize `job` into a runner request with the given settings.
pub(crate) fn run_request(job: &Job, settings: &ExecutionSettings) -> RunRequest {
    RunRequest {
        command: job.effective_command(settings),
        working_directory: job.working_directory.clone(),
        shell: settings.shell.clone(),
    }
}

/// Run `job` to completion, handing every output chunk to `on_output`.
///
/// The run is recorded in the history index like a scheduled run, the
/// notification is delivered, and a launch failure completes the run with
/// exit code -1 instead of returning an error.
pub async fn run_once<F>(
    store: &JobStore,
    runner: &ProcessRunner,
    notifier: &dyn NotificationSink,
    settings: &ExecutionSettings,
    job: &Job,
    mut on_output: F,
) -> Result<SingleRun, DaemonError>
where
    F: FnMut(&OutputChunk),
{
    store.ensure_directories().await?;
    let run = store.create_run(job.id).await?;
    let request = run_request(job, settings);
    let paths = store.run_log_paths(&run.id);
    info!(job_id = %job.id, job = %job.name, run_id = %run.id, "run started");

    let mut live = LiveOutput::new(&run);
    let (live_tx, mut live_rx) = mpsc::channel::<OutputChunk>(LIVE_CHANNEL_CAPACITY);
    let collect = async {
        while let Some(chunk) = live_rx.recv().await {
            live.append(chunk.stream, &chunk.text);
            on_output(&chunk);
        }
    };
    let (result, ()) = tokio::join!(
        runner.run(&request, &paths.stdout, &paths.stderr, Some(live_tx)),
        collect
    );

    let mut launch_error = None;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(job_id = %job.id, run_id = %run.id, "Failed to run job '{}': {}", job.name, e);
            live.append(OutputStream::Stderr, &e.to_string());
            launch_error = Some(e.to_string());
            RunOutcome::launch_failure()
        }
    };

    let completed = match store
        .complete_run(&run, outcome.exit_code, outcome.success)
        .await?
    {
        Some(stored) => stored,
        None => {
            let mut completed = run.clone();
            completed.complete(timestamp::now(), outcome.exit_code, outcome.success);
            completed
        }
    };
    let ended_at = completed.ended_at.unwrap_or_else(timestamp::now);
    let recorded = store
        .record_last_run(&job.id, ended_at, outcome.success)
        .await?;

    info!(
        job_id = %job.id,
        run_id = %completed.id,
        exit_code = outcome.exit_code,
        success = outcome.success,
        "run finished"
    );

    let notification = JobNotification {
        job_id: job.id,
        job_name: job.name.clone(),
        success: outcome.success,
        output_preview: live.preview(outcome.success),
    };
    if let Err(e) = notifier.notify(&notification).await {
        warn!(notifier = notifier.name(), "notification failed: {}", e);
    }

    Ok(SingleRun {
        run: completed,
        launch_error,
        recorded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use cronos_core::{CommandSpec, Schedule, ShellSettings};

    #[derive(Default)]
    struct Collected {
        sent: Mutex<Vec<JobNotification>>,
    }

    #[async_trait]
    impl NotificationSink for Collected {
        fn name(&self) -> &str {
            "collected"
        }

        async fn notify(&self, notification: &JobNotification) -> Result<(), DaemonError> {
            self.sent.lock().push(notification.clone());
            Ok(())
        }
    }

    fn settings() -> ExecutionSettings {
        ExecutionSettings {
            shell: ShellSettings::plain("/bin/sh"),
            ..ExecutionSettings::default()
        }
    }

    fn job(dir: &TempDir, command: &str) -> Job {
        Job::new(
            "Manual",
            CommandSpec::custom(command),
            dir.path().to_string_lossy(),
            Schedule::daily(4, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_run_once_streams_and_records() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::open(dir.path().join("store")).await.unwrap();
        let manual = job(&dir, "echo one; echo two >&2");
        store.save_jobs(std::slice::from_ref(&manual)).await.unwrap();

        // Edited elsewhere while this process holds an older copy.
        let mut renamed = manual.clone();
        renamed.name = "Manual (renamed)".to_string();
        store.save_jobs(&[renamed]).await.unwrap();

        let notifier = Arc::new(Collected::default());
        let mut seen = String::new();
        let result = run_once(
            &store,
            &ProcessRunner::new(),
            notifier.as_ref(),
            &settings(),
            &manual,
            |chunk| seen.push_str(&chunk.text),
        )
        .await
        .unwrap();

        assert!(seen.contains("one\n") && seen.contains("two\n"));
        assert_eq!(result.run.exit_code, Some(0));
        assert!(result.recorded);
        assert!(result.launch_error.is_none());

        let jobs = store.load_jobs().await.unwrap();
        assert_eq!(jobs[0].name, "Manual (renamed)");
        assert_eq!(jobs[0].last_run_successful, Some(true));
        assert_eq!(store.read_run_log(&result.run.id).await.unwrap().stdout, "one\n");
        assert_eq!(notifier.sent.lock()[0].body(), "Job 'Manual'\none");
    }

    #[tokio::test]
    async fn test_run_once_launch_failure_completes_run() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::open(dir.path().join("store")).await.unwrap();
        let mut broken = job(&dir, "echo never");
        broken.working_directory = dir.path().join("gone").to_string_lossy().into_owned();
        store.save_jobs(std::slice::from_ref(&broken)).await.unwrap();

        let notifier = Arc::new(Collected::default());
        let result = run_once(
            &store,
            &ProcessRunner::new(),
            notifier.as_ref(),
            &settings(),
            &broken,
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(result.run.exit_code, Some(-1));
        assert_eq!(result.run.success, Some(false));
        assert!(result.launch_error.is_some());
        assert_eq!(store.runs_for(&broken.id).await.unwrap(), vec![result.run.clone()]);
        assert!(!notifier.sent.lock()[0].success);
    }

    #[tokio::test]
    async fn test_run_once_for_deleted_job_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::open(dir.path().join("store")).await.unwrap();
        let orphan = job(&dir, "true");

        let result = run_once(
            &store,
            &ProcessRunner::new(),
            &crate::notify::NullNotifier,
            &settings(),
            &orphan,
            |_| {},
        )
        .await
        .unwrap();

        assert!(!result.recorded);
        assert!(store.load_jobs().await.unwrap().is_empty());
    }
}
