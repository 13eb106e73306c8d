//! Time primitives for BoneSync
//!
//! Both roles stamp snapshots with a shared-reference clock. Time is kept as
//! integer microseconds so that bracket spans and target times computed on
//! the observer are exact.

use std::ops::{Add, Sub};
use std::time::Duration;

/// State time - microseconds since the shared clock epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StateTime(pub i64);

impl StateTime {
    pub const ZERO: StateTime = StateTime(0);
    pub const MAX: StateTime = StateTime(i64::MAX);
    pub const MIN: StateTime = StateTime(i64::MIN);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        StateTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        StateTime(millis * 1000)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        StateTime((secs * 1_000_000.0).round() as i64)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Signed distance from `earlier` to `self` in microseconds
    #[inline]
    pub fn micros_since(self, earlier: StateTime) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Interpolate between two times with an unclamped factor
    #[inline]
    pub fn lerp(self, other: StateTime, t: f64) -> StateTime {
        let span = other.micros_since(self) as f64;
        StateTime(self.0 + (span * t).round() as i64)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        StateTime(self.0.saturating_add(duration_micros(duration)))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        StateTime(self.0.saturating_sub(duration_micros(duration)))
    }
}

/// Whole microseconds of `duration`, saturating at `i64::MAX`
#[inline]
fn duration_micros(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

impl Add<Duration> for StateTime {
    type Output = StateTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for StateTime {
    type Output = StateTime;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sub<StateTime> for StateTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: StateTime) -> Self::Output {
        let diff = self.0 - rhs.0;
        if diff >= 0 {
            Duration::from_micros(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for StateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_time_secs_roundtrip() {
        let time = StateTime::from_secs_f64(0.4);
        assert_eq!(time.as_micros(), 400_000);
        assert!((time.as_secs_f64() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_state_time_delay_is_exact() {
        let now = StateTime::from_secs_f64(0.4);
        let delay = Duration::from_millis(200);

        assert_eq!(now - delay, StateTime::from_millis(200));
    }

    #[test]
    fn test_state_time_lerp() {
        let a = StateTime::from_millis(0);
        let b = StateTime::from_millis(200);

        assert_eq!(a.lerp(b, 0.5), StateTime::from_millis(100));
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 1.5), StateTime::from_millis(300));
    }

    #[test]
    fn test_huge_durations_saturate() {
        let now = StateTime::from_secs_f64(10.0);

        // Both clamp the duration to i64::MAX micros before subtracting
        let floor = StateTime::from_micros(10_000_000 - i64::MAX);
        assert_eq!(now - Duration::MAX, floor);
        assert_eq!(now - Duration::from_micros(u64::MAX), floor);
        assert!(now - Duration::MAX < now);
        assert_eq!(now + Duration::MAX, StateTime::MAX);
    }

    #[test]
    fn test_state_time_difference_saturates() {
        let t1 = StateTime::from_millis(100);
        let t2 = StateTime::from_millis(50);

        assert_eq!(t2 - t1, Duration::ZERO);
        assert_eq!(t2.micros_since(t1), -50_000);
    }
}
