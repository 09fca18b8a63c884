//! Cronos Scheduler - one timer per enabled job.
//!
//! Timers run as Tokio tasks that sleep until the job's next occurrence and
//! then post a [`TimerFired`] message. The owner of the job list receives
//! those messages and calls [`Scheduler::handle_fire`], which triggers the
//! job and arms the following occurrence from the job's current state.
//!
//! Sleeps are checked against a [`WallClock`], so a machine that was
//! suspended past a fire time fires promptly on wake.

mod clock;
mod scheduler;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use scheduler::{positive_delay, Scheduler, TimerFired, WAKE_CHECK_INTERVAL};
