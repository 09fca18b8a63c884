//! Wall-clock sources for the timer bank.
//!
//! Tokio sleeps run on the monotonic clock, which stops while the machine is
//! suspended and ignores wall-clock steps. Timers therefore sleep in short
//! slices and compare a [`WallClock`] against their fire time after each one.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local};

/// Source of the current local time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The host's clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that starts at a chosen instant and then advances with Tokio's
/// clock, so a paused runtime drives it. [`ManualClock::jump`] moves wall
/// time without moving Tokio time, the way a suspend or a clock step does.
#[derive(Debug)]
pub struct ManualClock {
    start: DateTime<Local>,
    anchor: tokio::time::Instant,
    jumped_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            start,
            anchor: tokio::time::Instant::now(),
            jumped_ms: AtomicI64::new(0),
        }
    }

    /// Shift wall time by `by`, which may be negative.
    pub fn jump(&self, by: chrono::Duration) {
        self.jumped_ms.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed()).unwrap_or_default();
        let jumped = chrono::Duration::milliseconds(self.jumped_ms.load(Ordering::SeqCst));
        self.start + elapsed + jumped
    }
}
