//! Daemon subcommand handlers for Cronos.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use tracing::{error, info, warn};

use cronos_config::Config;
use cronos_daemon::{send_signal_to_pid, Daemon, DaemonError, DaemonSignal, PidFile};
use cronos_store::JobStore;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL_ATTEMPTS: u32 = 50;

/// Run the daemon in the foreground until SIGTERM or SIGINT.
pub(crate) async fn daemon_run(
    config_path: PathBuf,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(config = %config_path.display(), "Starting Cronos daemon...");
    Daemon::new(config_path, config).run().await?;
    info!("Cronos daemon stopped");
    Ok(())
}

/// Stop the daemon.
pub(crate) async fn daemon_stop(
    config: &Config,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pid_file = PidFile::new(config.pid_file());

    let Some(pid) = pid_file.running_pid()? else {
        println!("Daemon is not running");
        return Ok(());
    };

    info!("Stopping daemon (PID: {})...", pid);
    if force {
        kill_now(pid)?;
    } else {
        send_signal_to_pid(pid, DaemonSignal::Shutdown)?;
    }

    for _ in 0..STOP_POLL_ATTEMPTS {
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
        if !PidFile::is_process_running(pid) {
            // A killed daemon cannot clean up after itself.
            pid_file.remove()?;
            println!("Daemon stopped");
            return Ok(());
        }
    }

    if force {
        error!("Daemon did not stop in time");
    } else {
        warn!("Daemon did not stop gracefully, try --force");
    }
    Err(Box::new(DaemonError::Custom(format!(
        "Daemon (PID {}) is still running",
        pid
    ))))
}

#[cfg(unix)]
fn kill_now(pid: u32) -> Result<(), Box<dyn std::error::Error>> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)?;
    kill(Pid::from_raw(raw), Signal::SIGKILL)
        .map_err(|e| format!("Failed to send signal: {}", e))?;
    Ok(())
}

#[cfg(not(unix))]
fn kill_now(_pid: u32) -> Result<(), Box<dyn std::error::Error>> {
    Err("Signal sending not supported on this platform".into())
}

/// Print daemon state and a one-line summary per job.
pub(crate) async fn daemon_status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let pid_file = PidFile::new(config.pid_file());

    println!("Cronos Status");
    println!("=============");
    println!("Storage:  {}", config.storage_root().display());
    println!("PID File: {}", pid_file.path().display());
    match pid_file.running_pid()? {
        Some(pid) => println!("Daemon:   RUNNING (PID: {})", pid),
        None => println!("Daemon:   NOT RUNNING"),
    }

    let store = JobStore::new(config.storage_root());
    let jobs = store.load_jobs().await?;
    let enabled = jobs.iter().filter(|job| job.is_enabled).count();
    println!("Jobs:     {} ({} enabled)", jobs.len(), enabled);

    let now = Local::now();
    let next = jobs
        .iter()
        .filter(|job| job.is_enabled)
        .map(|job| (job.schedule.next_run(now), job))
        .min_by_key(|(at, _)| *at);
    if let Some((at, job)) = next {
        println!("Next:     {} at {}", job.name, at.format("%Y-%m-%d %H:%M"));
    }

    Ok(())
}

/// Ask a running daemon to re-read the jobs document.
///
/// The CLI edits `jobs.json` directly; without a daemon there is nothing to
/// tell.
pub(crate) fn notify_daemon(config: &Config) {
    let pid_file = PidFile::new(config.pid_file());
    match pid_file.running_pid() {
        Ok(Some(pid)) => {
            if let Err(e) = send_signal_to_pid(pid, DaemonSignal::Reload) {
                warn!("Failed to notify daemon: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to read PID file: {}", e),
    }
}
