//! Link settings shared by the authority and its observers

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BoneSyncError, BoneSyncResult, StateTime};

/// Longest accepted publish period
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Longest render delay an observer will apply
pub const MAX_DELAY: Duration = Duration::from_secs(600);

/// Publish cadence and observer render delay of a pose link.
///
/// The authority owns these values and replicates them; observers compute
/// their render delay from the authority's copy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkSettings {
    /// Resample/publish period
    pub interval: Duration,
    /// Observer render delay, in multiples of `interval`
    pub latency: f64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        LinkSettings {
            interval: Duration::from_millis(100),
            latency: 2.0,
        }
    }
}

impl LinkSettings {
    pub fn new(interval: Duration, latency: f64) -> Self {
        LinkSettings { interval, latency }
    }

    /// Fast cadence, short delay (LAN)
    pub fn responsive() -> Self {
        LinkSettings {
            interval: Duration::from_millis(33),
            latency: 1.5,
        }
    }

    /// Slow cadence, deep delay (lossy or metered links)
    pub fn low_bandwidth() -> Self {
        LinkSettings {
            interval: Duration::from_millis(200),
            latency: 3.0,
        }
    }

    /// Applied to local config and to every settings update received from
    /// the authority
    pub fn validate(&self) -> BoneSyncResult<()> {
        if self.interval.is_zero() {
            return Err(BoneSyncError::InvalidConfig(
                "interval must be greater than zero".into(),
            ));
        }
        if self.interval > MAX_INTERVAL {
            return Err(BoneSyncError::InvalidConfig(format!(
                "interval {:?} exceeds {:?}",
                self.interval, MAX_INTERVAL
            )));
        }
        if !self.latency.is_finite() || self.latency < 0.0 {
            return Err(BoneSyncError::InvalidConfig(format!(
                "latency must be a finite non-negative multiplier, got {}",
                self.latency
            )));
        }
        let delay_micros = self.interval.as_micros() as f64 * self.latency;
        if delay_micros > MAX_DELAY.as_micros() as f64 {
            return Err(BoneSyncError::InvalidConfig(format!(
                "render delay of {} intervals exceeds {:?}",
                self.latency, MAX_DELAY
            )));
        }
        Ok(())
    }

    /// Render delay: `latency * interval`, rounded to the microsecond and
    /// capped at [`MAX_DELAY`]
    pub fn delay(&self) -> Duration {
        let micros = (self.interval.as_micros() as f64 * self.latency).round();
        if micros.is_finite() && micros > 0.0 {
            Duration::from_micros(micros as u64).min(MAX_DELAY)
        } else {
            Duration::ZERO
        }
    }

    /// Deliberately delayed render time for `now`
    pub fn target_time(&self, now: StateTime) -> StateTime {
        now - self.delay()
    }
}

/// What the interpolation buffer does when the render time falls outside
/// the two buffered samples
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    /// Use the raw factor, extrapolating past the bracket
    #[default]
    Extrapolate,
    /// Clamp the factor to `[0, 1]`
    Clamp,
}

impl InterpolationMode {
    #[inline]
    pub fn apply(self, t: f64) -> f64 {
        match self {
            InterpolationMode::Extrapolate => t,
            InterpolationMode::Clamp => t.clamp(0.0, 1.0),
        }
    }
}
