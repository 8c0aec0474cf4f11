//! Countdown tick sources.
//!
//! The session never sleeps or spawns; it asks its timer how many ticks have
//! come due and applies them one by one. `IntervalTimer` derives ticks from
//! the wall clock, `ManualTimer` lets tests fire them by hand.

use std::time::{Duration, Instant};

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);

pub trait Timer {
    fn start(&mut self, interval: Duration);
    /// Idempotent; a stopped timer never reports ticks.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    /// Ticks that came due since the last call.
    fn take_due_ticks(&mut self) -> u32;
    /// Time left before the next tick, if running.
    fn until_next_tick(&self) -> Option<Duration>;
}

#[derive(Debug, Clone, Default)]
pub struct IntervalTimer {
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_due_ticks_at(&mut self, now: Instant) -> u32 {
        let Some(mut deadline) = self.next_deadline else {
            return 0;
        };

        let mut due = 0;
        while deadline <= now {
            due += 1;
            deadline += self.interval;
        }
        self.next_deadline = Some(deadline);
        due
    }
}

impl Timer for IntervalTimer {
    fn start(&mut self, interval: Duration) {
        // a zero interval would never let take_due_ticks return
        self.interval = interval.max(Duration::from_millis(1));
        self.next_deadline = Some(Instant::now() + self.interval);
    }

    fn stop(&mut self) {
        if self.next_deadline.take().is_some() {
            tracing::debug!("countdown stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.next_deadline.is_some()
    }

    fn take_due_ticks(&mut self) -> u32 {
        self.take_due_ticks_at(Instant::now())
    }

    fn until_next_tick(&self) -> Option<Duration> {
        self.next_deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Test timer: ticks only when fired.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    running: bool,
    pending: u32,
    interval: Option<Duration>,
    pub starts: u32,
    pub stops: u32,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `n` ticks. Ignored while stopped.
    pub fn fire(&mut self, n: u32) {
        if self.running {
            self.pending += n;
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Timer for ManualTimer {
    fn start(&mut self, interval: Duration) {
        self.running = true;
        self.pending = 0;
        self.interval = Some(interval);
        self.starts += 1;
    }

    fn stop(&mut self) {
        if self.running {
            self.stops += 1;
        }
        self.running = false;
        self.pending = 0;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn take_due_ticks(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }

    fn until_next_tick(&self) -> Option<Duration> {
        self.running.then_some(Duration::ZERO)
    }
}
