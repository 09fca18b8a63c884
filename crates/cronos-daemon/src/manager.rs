//! Job orchestration.
//!
//! A single coordinating task owns the job list, the timer bank, the set of
//! running jobs and their live output. Everything else talks to it through a
//! [`JobManagerHandle`]. Timer fires, output chunks and run completions reach
//! the task as messages, so none of that state is ever shared.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};

use cronos_core::job::filter_jobs;
use cronos_core::{ExecutionSettings, Job, JobId, LogRun, RunId};
use cronos_runner::{OutputChunk, OutputStream, ProcessRunner};
use cronos_scheduler::{SystemClock, WallClock};
use cronos_store::JobStore;

use crate::error::DaemonError;
use crate::manager_actor::ManagerActor;
use crate::notify::{output_preview, LogNotifier, NotificationSink};

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the live text kept per stream of a run.
pub const LIVE_OUTPUT_LIMIT: usize = 256 * 1024;

/// Broadcast to [`JobManagerHandle::subscribe`] receivers.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    RunStarted { job_id: JobId, run_id: RunId },
    Output { job_id: JobId, chunk: OutputChunk },
    RunCompleted { job_id: JobId, run: LogRun },
}

/// Text produced so far by a job's current (or most recent) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveOutput {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub stdout: String,
    pub stderr: String,
}

impl LiveOutput {
    pub fn new(run: &LogRun) -> Self {
        Self {
            run_id: run.id,
            started_at: run.started_at,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Append `text` to one stream, dropping the oldest text past
    /// [`LIVE_OUTPUT_LIMIT`].
    pub fn append(&mut self, stream: OutputStream, text: &str) {
        let buf = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        buf.push_str(text);
        if buf.len() > LIVE_OUTPUT_LIMIT {
            let mut cut = buf.len() - LIVE_OUTPUT_LIMIT;
            while !buf.is_char_boundary(cut) {
                cut += 1;
            }
            buf.drain(..cut);
        }
    }

    /// Notification preview: stdout on success, otherwise stderr unless it
    /// is blank.
    pub fn preview(&self, success: bool) -> String {
        let source = if success || self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        output_preview(source)
    }
}

type Reply<T> = oneshot::Sender<Result<T, DaemonError>>;

pub(crate) enum Command {
    Jobs(oneshot::Sender<Vec<Job>>),
    Job(JobId, oneshot::Sender<Option<Job>>),
    AddJob(Job, Reply<()>),
    UpdateJob(Job, Reply<bool>),
    DeleteJob(JobId, Reply<bool>),
    ToggleJob(JobId, Reply<Option<bool>>),
    RunNow(JobId, Reply<Option<RunId>>),
    RunningJobs(oneshot::Sender<Vec<JobId>>),
    LiveOutput(JobId, oneshot::Sender<Option<LiveOutput>>),
    NextFireAt(JobId, oneshot::Sender<Option<DateTime<Local>>>),
    LastError(oneshot::Sender<Option<String>>),
    ClearError(oneshot::Sender<()>),
    Reload(Reply<usize>),
    Shutdown(oneshot::Sender<()>),
}

/// Builds and starts the coordinating task.
pub struct JobManager {
    store: JobStore,
    runner: ProcessRunner,
    notifier: Arc<dyn NotificationSink>,
    settings: ExecutionSettings,
    clock: Arc<dyn WallClock>,
}

impl JobManager {
    pub fn new(store: JobStore) -> Self {
        Self {
            store,
            runner: ProcessRunner::new(),
            notifier: Arc::new(LogNotifier),
            settings: ExecutionSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wall clock the timers follow.
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load the jobs document, arm timers and spawn the coordinating task.
    ///
    /// Fails when the jobs document cannot be read, so a broken file is never
    /// overwritten with an empty list.
    pub async fn start(self) -> Result<JobManagerHandle, DaemonError> {
        self.store.ensure_directories().await?;
        let jobs = self.store.load_jobs().await?;

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let settings = Arc::new(RwLock::new(self.settings));

        let (actor, inbox) = ManagerActor::new(
            Arc::new(self.store),
            self.runner,
            self.notifier,
            settings.clone(),
            events.clone(),
            jobs,
            self.clock,
        );
        tokio::spawn(actor.run(commands_rx, inbox));

        Ok(JobManagerHandle {
            commands: commands_tx,
            settings,
            events,
        })
    }
}

/// Cloneable front door to a running [`JobManager`].
#[derive(Clone)]
pub struct JobManagerHandle {
    commands: mpsc::Sender<Command>,
    settings: Arc<RwLock<ExecutionSettings>>,
    events: broadcast::Sender<ManagerEvent>,
}

impl JobManagerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| DaemonError::ManagerStopped)?;
        rx.await.map_err(|_| DaemonError::ManagerStopped)
    }

    pub async fn jobs(&self) -> Result<Vec<Job>, DaemonError> {
        self.request(Command::Jobs).await
    }

    pub async fn job(&self, id: JobId) -> Result<Option<Job>, DaemonError> {
        self.request(|reply| Command::Job(id, reply)).await
    }

    /// Jobs whose name, command or prompt contains `query`, ignoring case.
    pub async fn filtered_jobs(&self, query: &str) -> Result<Vec<Job>, DaemonError> {
        let jobs = self.jobs().await?;
        Ok(filter_jobs(&jobs, query).into_iter().cloned().collect())
    }

    /// Add a job and persist the list.
    ///
    /// A save failure is returned but the job stays in memory and scheduled.
    pub async fn add_job(&self, job: Job) -> Result<(), DaemonError> {
        self.request(|reply| Command::AddJob(job, reply)).await?
    }

    /// Replace the job with the same id. Returns `false` if there is none.
    pub async fn update_job(&self, job: Job) -> Result<bool, DaemonError> {
        self.request(|reply| Command::UpdateJob(job, reply)).await?
    }

    /// Delete a job with its run history and log files.
    pub async fn delete_job(&self, id: JobId) -> Result<bool, DaemonError> {
        self.request(|reply| Command::DeleteJob(id, reply)).await?
    }

    /// Flip `is_enabled`. Returns the new state, or `None` for an unknown job.
    pub async fn toggle_job(&self, id: JobId) -> Result<Option<bool>, DaemonError> {
        self.request(|reply| Command::ToggleJob(id, reply)).await?
    }

    /// Start a run right away.
    ///
    /// Returns `None` when the job does not exist or is already running.
    pub async fn run_now(&self, id: JobId) -> Result<Option<RunId>, DaemonError> {
        self.request(|reply| Command::RunNow(id, reply)).await?
    }

    pub async fn running_jobs(&self) -> Result<Vec<JobId>, DaemonError> {
        self.request(Command::RunningJobs).await
    }

    pub async fn is_running(&self, id: JobId) -> Result<bool, DaemonError> {
        Ok(self.running_jobs().await?.contains(&id))
    }

    pub async fn live_output(&self, id: JobId) -> Result<Option<LiveOutput>, DaemonError> {
        self.request(|reply| Command::LiveOutput(id, reply)).await
    }

    pub async fn next_fire_at(&self, id: JobId) -> Result<Option<DateTime<Local>>, DaemonError> {
        self.request(|reply| Command::NextFireAt(id, reply)).await
    }

    /// Most recent failure message, if any.
    pub async fn last_error(&self) -> Result<Option<String>, DaemonError> {
        self.request(Command::LastError).await
    }

    pub async fn clear_error(&self) -> Result<(), DaemonError> {
        self.request(Command::ClearError).await
    }

    /// Re-read the jobs document and reschedule. Returns the job count.
    pub async fn reload(&self) -> Result<usize, DaemonError> {
        self.request(Command::Reload).await?
    }

    /// Settings used for runs started from now on.
    pub fn update_settings(&self, settings: ExecutionSettings) {
        *self.settings.write() = settings;
    }

    pub fn settings(&self) -> ExecutionSettings {
        self.settings.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    /// Stop the coordinating task and cancel every timer.
    ///
    /// Runs already in progress are not interrupted.
    pub async fn shutdown(&self) -> Result<(), DaemonError> {
        self.request(Command::Shutdown).await
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
