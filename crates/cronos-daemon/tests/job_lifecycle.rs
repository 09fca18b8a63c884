//! End-to-end tests for the job manager against a real store directory.
//!
//! These tests verify the flow from job creation through execution, history
//! and restart.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use cronos_core::{CommandSpec, ExecutionSettings, Job, JobId, LogRun, Schedule, ShellSettings};
use cronos_daemon::{JobManager, JobManagerHandle, ManagerEvent, NullNotifier};
use cronos_store::JobStore;

// ============================================================================
// Test Helpers
// ============================================================================

async fn start_manager(root: &std::path::Path) -> JobManagerHandle {
    let store = JobStore::open(root).await.unwrap();
    JobManager::new(store)
        .with_notifier(Arc::new(NullNotifier))
        .with_settings(ExecutionSettings {
            shell: ShellSettings::plain("/bin/sh"),
            ..ExecutionSettings::default()
        })
        .start()
        .await
        .unwrap()
}

async fn run_to_completion(manager: &JobManagerHandle, job_id: JobId) -> LogRun {
    let mut events: broadcast::Receiver<ManagerEvent> = manager.subscribe();
    manager.run_now(job_id).await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(ManagerEvent::RunCompleted { job_id: id, run }) = events.recv().await {
                if id == job_id {
                    return run;
                }
            }
        }
    })
    .await
    .unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_backup_job_history_survives_restart() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("cronos");
    let source = dir.path().join("photos");
    let target = dir.path().join("backup");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("cat.jpg"), b"meow").unwrap();

    let job = Job::new(
        "Backup photos",
        CommandSpec::custom(format!(
            "mkdir -p {} && cp -R {}/. {} && echo copied",
            target.display(),
            source.display(),
            target.display()
        )),
        dir.path().to_string_lossy(),
        Schedule::weekly(1, 2, 30).unwrap(),
    );

    let manager = start_manager(&root).await;
    manager.add_job(job.clone()).await.unwrap();

    let first = run_to_completion(&manager, job.id).await;
    let second = run_to_completion(&manager, job.id).await;
    assert_eq!(first.success, Some(true));
    assert_eq!(second.success, Some(true));
    assert_eq!(std::fs::read(target.join("cat.jpg")).unwrap(), b"meow");
    manager.shutdown().await.unwrap();

    let manager = start_manager(&root).await;
    let restored = manager.job(job.id).await.unwrap().unwrap();
    assert_eq!(restored.last_run_successful, Some(true));
    assert_eq!(restored.last_run.map(|t| t.timestamp()), second.ended_at.map(|t| t.timestamp()));
    assert!(manager.next_fire_at(job.id).await.unwrap().is_some());

    let store = JobStore::new(&root);
    let history = store.runs_for(&job.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(store.latest_run(&job.id).await.unwrap().map(|r| r.id), Some(second.id));
    assert_eq!(store.read_run_log(&first.id).await.unwrap().stdout, "copied\n");

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_independent_jobs_run_concurrently() {
    let dir = TempDir::new().unwrap();
    let manager = start_manager(dir.path()).await;

    let slow = Job::new(
        "Slow",
        CommandSpec::custom("sleep 1; echo slow"),
        dir.path().to_string_lossy(),
        Schedule::daily(4, 0).unwrap(),
    );
    let fast = Job::new(
        "Fast",
        CommandSpec::custom("echo fast"),
        dir.path().to_string_lossy(),
        Schedule::daily(4, 0).unwrap(),
    );
    manager.add_job(slow.clone()).await.unwrap();
    manager.add_job(fast.clone()).await.unwrap();

    let mut events = manager.subscribe();
    manager.run_now(slow.id).await.unwrap().unwrap();
    let fast_run = run_to_completion(&manager, fast.id).await;
    assert_eq!(fast_run.success, Some(true));
    assert!(manager.is_running(slow.id).await.unwrap());

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(ManagerEvent::RunCompleted { job_id, .. }) = events.recv().await {
                if job_id == slow.id {
                    return;
                }
            }
        }
    })
    .await
    .unwrap();
    assert!(manager.running_jobs().await.unwrap().is_empty());
}
