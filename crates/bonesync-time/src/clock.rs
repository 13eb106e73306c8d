//! Clock implementations for BoneSync
//!
//! Authority and observer read time through an explicitly passed `Clock`.
//! Interpolation math is only meaningful when both sides read the same
//! reference frame; providing that frame is the embedder's job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use bonesync_core::StateTime;

/// Monotonic time source shared by the link roles
pub trait Clock {
    /// Current time. MUST never decrease between calls.
    fn now(&self) -> StateTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> StateTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> StateTime {
        (**self).now()
    }
}

/// Wall clock backed by the OS monotonic clock
pub struct MonotonicClock {
    /// Instant corresponding to `epoch`
    reference: Instant,
    /// State time at `reference`
    epoch: StateTime,
}

impl MonotonicClock {
    /// Clock starting at zero
    pub fn new() -> Self {
        Self::starting_at(StateTime::ZERO)
    }

    /// Clock whose current reading is `epoch`
    pub fn starting_at(epoch: StateTime) -> Self {
        MonotonicClock {
            reference: Instant::now(),
            epoch,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.reference.elapsed()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> StateTime {
        self.epoch.saturating_add(self.reference.elapsed())
    }
}

/// Manually driven clock for simulations and tests.
///
/// Clones share the same time, so one handle can drive every role.
#[derive(Clone, Default)]
pub struct ManualClock {
    value: Arc<Mutex<StateTime>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(time: StateTime) -> Self {
        ManualClock {
            value: Arc::new(Mutex::new(time)),
        }
    }

    /// Advance by `dt` and return the new time
    pub fn advance(&self, dt: Duration) -> StateTime {
        let mut value = self.value.lock();
        *value = value.saturating_add(dt);
        *value
    }

    /// Jump to `target`. Only moves forward.
    pub fn set(&self, target: StateTime) {
        let mut value = self.value.lock();
        if target > *value {
            *value = target;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> StateTime {
        *self.value.lock()
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ManualClock").field(&self.now()).finish()
    }
}
