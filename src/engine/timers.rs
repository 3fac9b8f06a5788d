//! Named, cancellable timers for the engine loop.
//!
//! Each purpose gets exactly one slot; arming a slot replaces any pending
//! deadline for it, so at most one instance of each timer is ever
//! outstanding.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Advances the slideshow to the next file.
    Transition,
    /// Bounds the wait for the first managed file after a watch connects.
    FirstFile,
    /// Reports completion for an empty or unreachable file set.
    EmptyDone,
}

impl Timer {
    const ALL: [Timer; 3] = [Timer::Transition, Timer::FirstFile, Timer::EmptyDone];

    fn slot(self) -> usize {
        match self {
            Timer::Transition => 0,
            Timer::FirstFile => 1,
            Timer::EmptyDone => 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct TimerSet {
    deadlines: [Option<Instant>; 3],
}

impl TimerSet {
    pub fn arm(&mut self, timer: Timer, after: Duration) {
        self.deadlines[timer.slot()] = Some(Instant::now() + after);
    }

    pub fn cancel(&mut self, timer: Timer) {
        self.deadlines[timer.slot()] = None;
    }

    pub fn cancel_all(&mut self) {
        self.deadlines = [None; 3];
    }

    pub fn is_armed(&self, timer: Timer) -> bool {
        self.deadlines[timer.slot()].is_some()
    }

    /// The next timer due to fire, if any slot is armed.
    pub fn next_deadline(&self) -> Option<(Timer, Instant)> {
        let mut next: Option<(Timer, Instant)> = None;
        for timer in Timer::ALL {
            if let Some(at) = self.deadlines[timer.slot()]
                && next.is_none_or(|(_, best)| at < best)
            {
                next = Some((timer, at));
            }
        }
        next
    }

    /// Clear the slot of a timer that just fired.
    pub fn fired(&mut self, timer: Timer) {
        self.cancel(timer);
    }
}
