//! Fixed-cadence send schedule
//!
//! The deadline advances additively (`next += interval`) rather than being
//! reset to `now + interval`, so frame-rate jitter never stretches the
//! effective publish period. At most one send fires per poll; a schedule that
//! fell behind catches up over the following ticks.

use std::time::Duration;

use bonesync_core::StateTime;

/// Publish deadline tracker for the authority role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendSchedule {
    next_send: StateTime,
}

impl SendSchedule {
    /// Schedule whose first send is due at `start`
    pub fn new(start: StateTime) -> Self {
        SendSchedule { next_send: start }
    }

    /// Time at which the next send becomes due
    pub fn next_send(&self) -> StateTime {
        self.next_send
    }

    /// Whether a send is due at `now`
    pub fn is_due(&self, now: StateTime) -> bool {
        now >= self.next_send
    }

    /// Returns true if a send is due, advancing the deadline by `interval`
    pub fn poll(&mut self, now: StateTime, interval: Duration) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_send = self.next_send + interval;
        true
    }
}
