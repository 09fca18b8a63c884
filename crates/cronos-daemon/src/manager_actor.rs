//! The coordinating task behind [`JobManagerHandle`](crate::JobManagerHandle).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use cronos_core::{timestamp, ExecutionSettings, Job, JobId, LogRun, RunId};
use cronos_runner::{
    OutputChunk, OutputStream, ProcessRunner, RunOutcome, RunRequest, RunnerError,
};
use cronos_scheduler::{Scheduler, TimerFired, WallClock};
use cronos_store::{JobStore, LogPaths};

use crate::error::DaemonError;
use crate::manager::{Command, LiveOutput, ManagerEvent};
use crate::notify::{JobNotification, NotificationSink};
use crate::single::run_request;

const FIRE_CHANNEL_CAPACITY: usize = 64;
const RUN_EVENT_CHANNEL_CAPACITY: usize = 256;
const LIVE_CHANNEL_CAPACITY: usize = 64;

/// Sent from a run task back to the coordinating task.
enum RunEvent {
    Output {
        job_id: JobId,
        chunk: OutputChunk,
    },
    Finished {
        job_id: JobId,
        job_name: String,
        run: LogRun,
        result: Result<RunOutcome, RunnerError>,
    },
}

pub(crate) struct ManagerActor {
    store: Arc<JobStore>,
    runner: ProcessRunner,
    notifier: Arc<dyn NotificationSink>,
    settings: Arc<RwLock<ExecutionSettings>>,
    events: broadcast::Sender<ManagerEvent>,
    jobs: Vec<Job>,
    scheduler: Scheduler,
    running: HashSet<JobId>,
    live: HashMap<JobId, LiveOutput>,
    last_error: Option<String>,
    run_tx: mpsc::Sender<RunEvent>,
}

/// Receivers drained by [`ManagerActor::run`].
pub(crate) struct ActorInbox {
    fired: mpsc::Receiver<TimerFired>,
    runs: mpsc::Receiver<RunEvent>,
}

impl ManagerActor {
    pub(crate) fn new(
        store: Arc<JobStore>,
        runner: ProcessRunner,
        notifier: Arc<dyn NotificationSink>,
        settings: Arc<RwLock<ExecutionSettings>>,
        events: broadcast::Sender<ManagerEvent>,
        jobs: Vec<Job>,
        clock: Arc<dyn WallClock>,
    ) -> (Self, ActorInbox) {
        let (scheduler, fired) = Scheduler::channel_with_clock(FIRE_CHANNEL_CAPACITY, clock);
        let (run_tx, runs) = mpsc::channel(RUN_EVENT_CHANNEL_CAPACITY);
        let actor = Self {
            store,
            runner,
            notifier,
            settings,
            events,
            jobs,
            scheduler,
            running: HashSet::new(),
            live: HashMap::new(),
            last_error: None,
            run_tx,
        };
        (actor, ActorInbox { fired, runs })
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        inbox: ActorInbox,
    ) {
        let ActorInbox {
            mut fired,
            mut runs,
        } = inbox;

        self.scheduler.reschedule(&self.jobs);
        info!(jobs = self.jobs.len(), "job manager started");

        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                Some(fire) = fired.recv() => self.on_timer(fire).await,
                Some(event) = runs.recv() => self.on_run_event(event).await,
                command = commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.scheduler.cancel_all();
        info!(running = self.running.len(), "job manager stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Jobs(reply) => {
                let _ = reply.send(self.jobs.clone());
            }
            Command::Job(id, reply) => {
                let _ = reply.send(self.find(&id).cloned());
            }
            Command::AddJob(job, reply) => {
                info!(job_id = %job.id, job = %job.name, "adding job");
                self.jobs.push(job);
                let result = self.save_jobs().await;
                self.scheduler.reschedule(&self.jobs);
                let _ = reply.send(result);
            }
            Command::UpdateJob(job, reply) => {
                let _ = reply.send(self.update_job(job).await);
            }
            Command::DeleteJob(id, reply) => {
                let _ = reply.send(self.delete_job(id).await);
            }
            Command::ToggleJob(id, reply) => {
                let result = match self.find(&id).cloned() {
                    Some(mut job) => {
                        job.is_enabled = !job.is_enabled;
                        let enabled = job.is_enabled;
                        self.update_job(job).await.map(|_| Some(enabled))
                    }
                    None => Ok(None),
                };
                let _ = reply.send(result);
            }
            Command::RunNow(id, reply) => {
                let _ = reply.send(self.start_run(id).await);
            }
            Command::RunningJobs(reply) => {
                let _ = reply.send(self.running.iter().copied().collect());
            }
            Command::LiveOutput(id, reply) => {
                let _ = reply.send(self.live.get(&id).cloned());
            }
            Command::NextFireAt(id, reply) => {
                let _ = reply.send(self.scheduler.next_fire_at(&id));
            }
            Command::LastError(reply) => {
                let _ = reply.send(self.last_error.clone());
            }
            Command::ClearError(reply) => {
                self.last_error = None;
                let _ = reply.send(());
            }
            Command::Reload(reply) => {
                let _ = reply.send(self.reload().await);
            }
            // Handled by the loop.
            Command::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn find(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == *id)
    }

    async fn update_job(&mut self, job: Job) -> Result<bool, DaemonError> {
        let Some(slot) = self.jobs.iter_mut().find(|existing| existing.id == job.id) else {
            debug!(job_id = %job.id, "update for unknown job ignored");
            return Ok(false);
        };
        *slot = job;
        let result = self.save_jobs().await;
        self.scheduler.reschedule(&self.jobs);
        result.map(|_| true)
    }

    async fn delete_job(&mut self, id: JobId) -> Result<bool, DaemonError> {
        let Some(index) = self.jobs.iter().position(|job| job.id == id) else {
            debug!(job_id = %id, "delete for unknown job ignored");
            return Ok(false);
        };
        let job = self.jobs.remove(index);
        info!(job_id = %id, job = %job.name, "deleting job");

        self.scheduler.cancel_job(&id);
        self.live.remove(&id);
        self.store.delete_legacy_log(&id).await;
        if let Err(e) = self.store.delete_runs_for(&id).await {
            self.report(format!("Failed to delete run history for '{}': {}", job.name, e));
        }

        let result = self.save_jobs().await;
        self.scheduler.reschedule(&self.jobs);
        result.map(|_| true)
    }

    async fn reload(&mut self) -> Result<usize, DaemonError> {
        match self.store.load_jobs().await {
            Ok(jobs) => {
                self.jobs = jobs;
                self.scheduler.reschedule(&self.jobs);
                info!(jobs = self.jobs.len(), "jobs reloaded");
                Ok(self.jobs.len())
            }
            Err(e) => {
                self.report(format!("Failed to load jobs: {}", e));
                Err(e.into())
            }
        }
    }

    async fn save_jobs(&mut self) -> Result<(), DaemonError> {
        if let Err(e) = self.store.save_jobs(&self.jobs).await {
            self.report(format!("Failed to save jobs: {}", e));
            return Err(e.into());
        }
        Ok(())
    }

    fn report(&mut self, message: String) {
        warn!("{}", message);
        self.last_error = Some(message);
    }

    async fn on_timer(&mut self, fired: TimerFired) {
        let jobs = &self.jobs;
        let mut due = None;
        self.scheduler
            .handle_fire(fired, || jobs.clone(), |job_id| due = Some(job_id));

        if let Some(job_id) = due {
            // Failures are already recorded in last_error.
            let _ = self.start_run(job_id).await;
        }
    }

    async fn start_run(&mut self, job_id: JobId) -> Result<Option<RunId>, DaemonError> {
        if self.running.contains(&job_id) {
            debug!(job_id = %job_id, "job already running, trigger skipped");
            return Ok(None);
        }
        let Some(job) = self.find(&job_id).cloned() else {
            debug!(job_id = %job_id, "triggered job no longer exists");
            return Ok(None);
        };

        self.running.insert(job_id);
        let run = match self.store.create_run(job_id).await {
            Ok(run) => run,
            Err(e) => {
                self.running.remove(&job_id);
                let message = format!("Failed to create log run for '{}': {}", job.name, e);
                error!(job_id = %job_id, "{}", message);
                self.last_error = Some(message);
                return Err(e.into());
            }
        };

        let settings = self.settings.read().clone();
        let request = run_request(&job, &settings);
        let paths = self.store.run_log_paths(&run.id);
        let run_id = run.id;

        self.live.insert(job_id, LiveOutput::new(&run));
        let _ = self.events.send(ManagerEvent::RunStarted { job_id, run_id });
        info!(job_id = %job_id, job = %job.name, run_id = %run_id, "run started");

        tokio::spawn(execute(
            self.runner.clone(),
            request,
            paths,
            job_id,
            job.name,
            run,
            self.run_tx.clone(),
        ));
        Ok(Some(run_id))
    }

    async fn on_run_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::Output { job_id, chunk } => {
                if let Some(live) = self.live.get_mut(&job_id) {
                    live.append(chunk.stream, &chunk.text);
                }
                let _ = self.events.send(ManagerEvent::Output { job_id, chunk });
            }
            RunEvent::Finished {
                job_id,
                job_name,
                run,
                result,
            } => self.finish_run(job_id, job_name, run, result).await,
        }
    }

    async fn finish_run(
        &mut self,
        job_id: JobId,
        job_name: String,
        run: LogRun,
        result: Result<RunOutcome, RunnerError>,
    ) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("Failed to run job '{}': {}", job_name, e);
                error!(job_id = %job_id, run_id = %run.id, "{}", message);
                if let Some(live) = self.live.get_mut(&job_id) {
                    live.append(OutputStream::Stderr, &e.to_string());
                }
                self.last_error = Some(message);
                RunOutcome::launch_failure()
            }
        };

        let mut completed = run.clone();
        completed.complete(timestamp::now(), outcome.exit_code, outcome.success);
        match self
            .store
            .complete_run(&run, outcome.exit_code, outcome.success)
            .await
        {
            Ok(Some(stored)) => completed = stored,
            Ok(None) => {}
            Err(e) => self.report(format!("Failed to record run for '{}': {}", job_name, e)),
        }

        let ended_at = completed.ended_at.unwrap_or_else(timestamp::now);
        if let Some(job) = self.jobs.iter_mut().find(|job| job.id == job_id) {
            job.record_run(ended_at, outcome.success);
            // Failures are already recorded in last_error.
            let _ = self.save_jobs().await;
        }
        self.running.remove(&job_id);

        info!(
            job_id = %job_id,
            job = %job_name,
            run_id = %completed.id,
            exit_code = outcome.exit_code,
            success = outcome.success,
            "run finished"
        );

        let notification = JobNotification {
            job_id,
            job_name,
            success: outcome.success,
            output_preview: self
                .live
                .get(&job_id)
                .map(|live| live.preview(outcome.success))
                .unwrap_or_default(),
        };
        // Delivery can wait on an external program; keep it off this task.
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(notifier = notifier.name(), "notification failed: {}", e);
            }
        });

        let _ = self.events.send(ManagerEvent::RunCompleted {
            job_id,
            run: completed,
        });
    }
}

/// Body of a run task: launch the process and forward its output.
async fn execute(
    runner: ProcessRunner,
    request: RunRequest,
    paths: LogPaths,
    job_id: JobId,
    job_name: String,
    run: LogRun,
    run_tx: mpsc::Sender<RunEvent>,
) {
    let (live_tx, mut live_rx) = mpsc::channel(LIVE_CHANNEL_CAPACITY);
    let output_tx = run_tx.clone();
    let forward = async move {
        while let Some(chunk) = live_rx.recv().await {
            if output_tx
                .send(RunEvent::Output { job_id, chunk })
                .await
                .is_err()
            {
                break;
            }
        }
    };

    let (result, ()) = tokio::join!(
        runner.run(&request, &paths.stdout, &paths.stderr, Some(live_tx)),
        forward
    );

    if run_tx
        .send(RunEvent::Finished {
            job_id,
            job_name,
            run,
            result,
        })
        .await
        .is_err()
    {
        debug!(job_id = %job_id, "job manager gone before run finished");
    }
}
