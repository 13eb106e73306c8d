//! Interpolation Buffer - delayed render of buffered snapshots
//!
//! The observer renders at `now - latency * interval`, so at least one
//! newer snapshot is normally buffered past the render time. Each tick:
//! 1. Compute the target time
//! 2. Drop the head if the second entry is already older than the target
//! 3. Interpolate between the first two entries

use std::collections::VecDeque;

use bonesync_core::{InterpolationMode, LinkSettings, PoseSnapshot, StateTime};

/// Bracket span, in microseconds, at or below which the earlier snapshot is
/// returned as is
pub const MIN_BRACKET_SPAN: i64 = 1;

/// Time-ascending snapshot history owned by one observer link
#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    history: VecDeque<PoseSnapshot>,
    /// Output of the last sample; reused across ticks
    scratch: PoseSnapshot,
    mode: InterpolationMode,
}

impl InterpolationBuffer {
    pub fn new(mode: InterpolationMode) -> Self {
        InterpolationBuffer {
            history: VecDeque::new(),
            scratch: PoseSnapshot::new(StateTime::ZERO, 0),
            mode,
        }
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InterpolationMode) {
        self.mode = mode;
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Oldest buffered snapshot
    pub fn front(&self) -> Option<&PoseSnapshot> {
        self.history.front()
    }

    /// Newest buffered snapshot
    pub fn latest(&self) -> Option<&PoseSnapshot> {
        self.history.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseSnapshot> {
        self.history.iter()
    }

    /// Append at the tail. Snapshots must arrive in ascending time order.
    pub fn push(&mut self, snapshot: PoseSnapshot) {
        debug_assert!(self
            .history
            .back()
            .map_or(true, |last| last.time <= snapshot.time));
        self.history.push_back(snapshot);
    }

    /// Drop the head once if the second entry is older than `target`.
    ///
    /// Never drops more than one entry per call and never empties the
    /// history. Returns whether an entry was dropped.
    pub fn prune(&mut self, target: StateTime) -> bool {
        let stale = self.history.len() >= 2
            && self.history.get(1).map_or(false, |second| second.time < target);
        if stale {
            self.history.pop_front();
        }
        stale
    }

    /// Interpolated snapshot at `target`, without pruning.
    ///
    /// `None` until the first snapshot is buffered.
    pub fn sample_at(&mut self, target: StateTime) -> Option<&PoseSnapshot> {
        let d0 = self.history.front()?;
        let d1 = self.history.get(1).unwrap_or(d0);

        let span = d1.time.micros_since(d0.time);
        if span <= MIN_BRACKET_SPAN {
            self.scratch.copy_from(d0);
        } else {
            let t = target.micros_since(d0.time) as f64 / span as f64;
            self.scratch.interpolate_from(d0, d1, self.mode.apply(t));
        }
        Some(&self.scratch)
    }

    /// One observer tick: compute the target time from `settings`, prune,
    /// then interpolate
    pub fn sample(&mut self, now: StateTime, settings: &LinkSettings) -> Option<&PoseSnapshot> {
        let target = settings.target_time(now);
        self.prune(target);
        self.sample_at(target)
    }

    /// Drop every buffered snapshot
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::new(InterpolationMode::default())
    }
}
