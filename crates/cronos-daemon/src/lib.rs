//! # Cronos Daemon
//!
//! Runs scheduled jobs in the background.
//!
//! ## Features
//!
//! - Job orchestration: one coordinating task owns the job list, the timers
//!   and the set of running jobs
//! - At most one run per job at a time
//! - Live output broadcast while a run is in progress
//! - Completion notifications (desktop, log or none)
//! - One-off runs outside the daemon that touch only the run's own job
//! - PID file management (prevents duplicate instances)
//! - Signal handling (SIGTERM/SIGINT for shutdown, SIGHUP for reload)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cronos_daemon::JobManager;
//! use cronos_store::JobStore;
//!
//! let store = JobStore::open("~/.cronos").await?;
//! let manager = JobManager::new(store).start().await?;
//! let run_id = manager.run_now(job_id).await?;
//! ```

pub mod daemon;
pub mod error;
mod manager;
mod manager_actor;
pub mod notify;
pub mod pid;
pub mod signal;
mod single;

pub use daemon::Daemon;
pub use error::DaemonError;
pub use manager::{JobManager, JobManagerHandle, LiveOutput, ManagerEvent, LIVE_OUTPUT_LIMIT};
pub use notify::{
    notifier_from_config, output_preview, DesktopNotifier, JobNotification, LogNotifier,
    NotificationSink, NullNotifier,
};
pub use pid::PidFile;
pub use signal::{send_signal_to_pid, DaemonSignal, SignalHandler};
pub use single::{run_once, SingleRun};
