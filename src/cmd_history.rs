//! Run history and log handlers for Cronos.

use cronos_config::Config;
use cronos_core::{JobId, RunId};
use cronos_daemon::DaemonError;
use cronos_store::JobStore;

use crate::cmd_job::run_summary;

/// List the runs of a job, newest first.
pub(crate) async fn show_history(
    config: &Config,
    job_id: JobId,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = JobStore::new(config.storage_root());
    let runs = store.runs_for(&job_id).await?;

    if runs.is_empty() {
        let legacy = store.read_legacy_log(&job_id).await?;
        if legacy.stdout.is_empty() && legacy.stderr.is_empty() {
            println!("No runs recorded for job {}", job_id);
        } else {
            println!("No runs recorded; legacy log available:");
            print_streams(&legacy.stdout, &legacy.stderr, true, true);
        }
        return Ok(());
    }

    for run in runs.iter().take(limit) {
        println!("{}", run_summary(run));
    }
    if runs.len() > limit {
        println!("... {} older run(s)", runs.len() - limit);
    }
    Ok(())
}

/// Print the captured output of one run.
pub(crate) async fn show_logs(
    config: &Config,
    run_id: RunId,
    stdout_only: bool,
    stderr_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = JobStore::new(config.storage_root());
    if store.find_run(&run_id).await?.is_none() {
        return Err(Box::new(DaemonError::Custom(format!("Run not found: {}", run_id))));
    }

    let logs = store.read_run_log(&run_id).await?;
    print_streams(&logs.stdout, &logs.stderr, !stderr_only, !stdout_only);
    Ok(())
}

fn print_streams(stdout: &str, stderr: &str, show_stdout: bool, show_stderr: bool) {
    if show_stdout {
        print!("{}", stdout);
    }
    if show_stderr && !stderr.is_empty() {
        if show_stdout {
            eprintln!("--- stderr ---");
        }
        eprint!("{}", stderr);
    }
}
