//! Timer bank keyed by job id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use cronos_core::{Job, JobId, Schedule};

use crate::clock::{SystemClock, WallClock};

/// Longest single sleep of a timer task before it re-reads the wall clock.
pub const WAKE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Posted by a timer task when its job is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub job_id: JobId,
    /// Identifies the arming that produced this message. A message whose
    /// generation no longer matches the armed timer is stale.
    pub generation: u64,
}

struct ArmedTimer {
    generation: u64,
    fire_at: DateTime<Local>,
    handle: JoinHandle<()>,
}

/// Holds at most one armed timer per job.
///
/// All methods must be called from the context that owns the job list.
/// Timer tasks never see a [`Job`]; they only report the id back.
pub struct Scheduler {
    timers: HashMap<JobId, ArmedTimer>,
    fire_tx: mpsc::Sender<TimerFired>,
    next_generation: u64,
    clock: Arc<dyn WallClock>,
}

impl Scheduler {
    /// Create a scheduler that posts fires on `fire_tx`.
    pub fn new(fire_tx: mpsc::Sender<TimerFired>) -> Self {
        Self::with_clock(fire_tx, Arc::new(SystemClock))
    }

    /// Create a scheduler whose timers follow `clock`.
    pub fn with_clock(fire_tx: mpsc::Sender<TimerFired>, clock: Arc<dyn WallClock>) -> Self {
        Self {
            timers: HashMap::new(),
            fire_tx,
            next_generation: 0,
            clock,
        }
    }

    /// Create a scheduler together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TimerFired>) {
        Self::channel_with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn channel_with_clock(
        capacity: usize,
        clock: Arc<dyn WallClock>,
    ) -> (Self, mpsc::Receiver<TimerFired>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::with_clock(tx, clock), rx)
    }

    /// Current time according to this scheduler's clock.
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Replace every timer with one per enabled job.
    pub fn reschedule(&mut self, jobs: &[Job]) {
        self.reschedule_at(jobs, self.now());
    }

    /// [`Scheduler::reschedule`] with an explicit current time.
    pub fn reschedule_at(&mut self, jobs: &[Job], now: DateTime<Local>) {
        self.cancel_all();
        for job in jobs.iter().filter(|job| job.is_enabled) {
            self.arm(job.id, &job.schedule, now);
        }
        info!(armed = self.timers.len(), total = jobs.len(), "jobs rescheduled");
    }

    /// Handle a fire message.
    ///
    /// Stale messages are ignored and `false` is returned. Otherwise the spent
    /// timer is removed, `trigger` is called with the job id, and the job list
    /// returned by `provider` decides whether a next timer is armed.
    pub fn handle_fire<P, T>(&mut self, fired: TimerFired, provider: P, trigger: T) -> bool
    where
        P: FnOnce() -> Vec<Job>,
        T: FnOnce(JobId),
    {
        let now = self.now();
        self.handle_fire_at(fired, provider, trigger, now)
    }

    /// [`Scheduler::handle_fire`] with an explicit current time.
    pub fn handle_fire_at<P, T>(
        &mut self,
        fired: TimerFired,
        provider: P,
        trigger: T,
        now: DateTime<Local>,
    ) -> bool
    where
        P: FnOnce() -> Vec<Job>,
        T: FnOnce(JobId),
    {
        let current = self
            .timers
            .get(&fired.job_id)
            .is_some_and(|timer| timer.generation == fired.generation);
        if !current {
            debug!(job_id = %fired.job_id, generation = fired.generation, "stale timer fire ignored");
            return false;
        }
        let Some(spent) = self.timers.remove(&fired.job_id) else {
            return false;
        };

        debug!(job_id = %fired.job_id, "timer fired");
        trigger(fired.job_id);

        let jobs = provider();
        match jobs.iter().find(|job| job.id == fired.job_id) {
            Some(job) if job.is_enabled => {
                // The timer task and the wall clock can disagree slightly, so
                // never compute the next occurrence from before the one that
                // just fired.
                let after = now.max(spent.fire_at);
                self.arm(job.id, &job.schedule, after);
            }
            Some(_) => debug!(job_id = %fired.job_id, "job disabled, not rearmed"),
            None => debug!(job_id = %fired.job_id, "job removed, not rearmed"),
        }
        true
    }

    /// Abort the timer for `job_id`, if any.
    pub fn cancel_job(&mut self, job_id: &JobId) {
        if let Some(timer) = self.timers.remove(job_id) {
            timer.handle.abort();
            debug!(job_id = %job_id, "timer cancelled");
        }
    }

    /// Abort every timer.
    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }

    /// When the timer for `job_id` is due, if one is armed.
    pub fn next_fire_at(&self, job_id: &JobId) -> Option<DateTime<Local>> {
        self.timers.get(job_id).map(|timer| timer.fire_at)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_armed(&self, job_id: &JobId) -> bool {
        self.timers.contains_key(job_id)
    }

    fn arm(&mut self, job_id: JobId, schedule: &Schedule, now: DateTime<Local>) {
        let mut fire_at = schedule.next_run(now);
        let delay = match positive_delay(fire_at, now) {
            Some(delay) => delay,
            None => {
                fire_at = schedule.next_run(now + chrono::Duration::seconds(1));
                positive_delay(fire_at, now).unwrap_or(Duration::from_secs(1))
            }
        };

        self.cancel_job(&job_id);
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.fire_tx.clone();
        let clock = Arc::clone(&self.clock);
        let handle = tokio::spawn(async move {
            wait_until(clock.as_ref(), fire_at).await;
            // The receiver is gone only during shutdown.
            let _ = tx.send(TimerFired { job_id, generation }).await;
        });

        debug!(
            job_id = %job_id,
            fire_at = %fire_at.to_rfc3339(),
            delay_secs = delay.as_secs(),
            "timer armed"
        );
        self.timers.insert(
            job_id,
            ArmedTimer {
                generation,
                fire_at,
                handle,
            },
        );
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Sleep until `clock` reads `fire_at` or later.
///
/// Each sleep is capped at [`WAKE_CHECK_INTERVAL`], so time spent suspended
/// or a wall-clock step delays a fire by at most one interval.
async fn wait_until(clock: &dyn WallClock, fire_at: DateTime<Local>) {
    while let Some(remaining) = positive_delay(fire_at, clock.now()) {
        tokio::time::sleep(remaining.min(WAKE_CHECK_INTERVAL)).await;
    }
}

/// Time from `now` until `fire_at`, or `None` when it is not in the future.
pub fn positive_delay(fire_at: DateTime<Local>, now: DateTime<Local>) -> Option<Duration> {
    let delta = fire_at.signed_duration_since(now);
    if delta <= chrono::Duration::zero() {
        return None;
    }
    delta.to_std().ok()
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
