//! Delta Encoder - authority-side differential pose publication
//!
//! On activation every field of every bone is published once so a fresh
//! observer has a baseline. After that, each due tick samples the pose into
//! the "current" buffer, diffs it against "previous" and writes only the
//! changed fields. The two buffers then swap roles.

use bonesync_core::{BoneSyncError, BoneSyncResult, LinkSettings, PoseSnapshot, StateTime};
use bonesync_time::SendSchedule;
use bonesync_wire::PoseMessage;
use tracing::{debug, info};

use crate::{BoneMap, Hierarchy, PoseChannels};

/// Encoder lifecycle. `Inactive -> Active` only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    Inactive,
    Active,
}

/// Outcome of one publish cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Bones with at least one changed field
    pub bones_changed: usize,
    /// Field writes queued on the channels
    pub field_writes: usize,
}

/// Authority-side pose publisher
#[derive(Debug)]
pub struct PoseEncoder {
    map: BoneMap,
    settings: LinkSettings,
    state: EncoderState,
    schedule: SendSchedule,
    /// Previous/current pair; `previous` indexes the former
    buffers: [PoseSnapshot; 2],
    previous: usize,
    channels: PoseChannels,
    publishes: u64,
}

impl PoseEncoder {
    pub fn new(map: BoneMap, settings: LinkSettings) -> BoneSyncResult<Self> {
        settings.validate()?;
        let bone_count = map.len();
        Ok(PoseEncoder {
            map,
            settings,
            state: EncoderState::Inactive,
            schedule: SendSchedule::new(StateTime::ZERO),
            buffers: [
                PoseSnapshot::new(StateTime::ZERO, bone_count),
                PoseSnapshot::new(StateTime::ZERO, bone_count),
            ],
            previous: 0,
            channels: PoseChannels::new(),
            publishes: 0,
        })
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EncoderState::Active
    }

    pub fn settings(&self) -> LinkSettings {
        self.settings
    }

    pub fn bone_map(&self) -> &BoneMap {
        &self.map
    }

    pub fn bone_count(&self) -> usize {
        self.map.len()
    }

    /// Number of due ticks processed since activation
    pub fn publish_count(&self) -> u64 {
        self.publishes
    }

    /// Most recent sample, i.e. the baseline of the next diff
    pub fn last_sample(&self) -> &PoseSnapshot {
        &self.buffers[self.previous]
    }

    /// Next time a sample is due
    pub fn next_send(&self) -> StateTime {
        self.schedule.next_send()
    }

    /// Enable pose evaluation on `hierarchy`, capture the baseline and queue a
    /// full sync of every field plus the current settings.
    pub fn activate<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &mut H,
        now: StateTime,
    ) -> BoneSyncResult<PublishStats> {
        if self.is_active() {
            return Err(BoneSyncError::AlreadyActive);
        }

        hierarchy.set_pose_evaluation(true);
        let baseline = &mut self.buffers[self.previous];
        self.map.capture_into(&*hierarchy, now, baseline)?;

        self.channels.publish_settings(self.settings);
        let field_writes = self.channels.full_sync(baseline);

        self.schedule = SendSchedule::new(now + self.settings.interval);
        self.state = EncoderState::Active;

        info!(
            bones = self.map.len(),
            interval_ms = self.settings.interval.as_millis() as u64,
            latency = self.settings.latency,
            "pose encoder active"
        );

        Ok(PublishStats {
            bones_changed: self.map.len(),
            field_writes,
        })
    }

    /// Run one scheduling tick.
    ///
    /// Returns `None` when no sample was due, otherwise what was published.
    pub fn tick<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &H,
        now: StateTime,
    ) -> BoneSyncResult<Option<PublishStats>> {
        if !self.is_active() {
            return Err(BoneSyncError::LinkInactive);
        }
        if !self.schedule.poll(now, self.settings.interval) {
            return Ok(None);
        }

        let current_index = 1 - self.previous;
        let [first, second] = &mut self.buffers;
        let (previous, current) = if self.previous == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };
        self.map.capture_into(hierarchy, now, current)?;

        let mut stats = PublishStats::default();
        for (index, (new, old)) in current.bones.iter().zip(previous.bones.iter()).enumerate() {
            let changes = new.changes_since(old);
            if changes.is_empty() {
                continue;
            }
            stats.bones_changed += 1;
            stats.field_writes += self.channels.publish(index, changes, new)?;
        }

        self.previous = current_index;
        self.publishes += 1;

        debug!(
            bones_changed = stats.bones_changed,
            field_writes = stats.field_writes,
            next_send_us = self.schedule.next_send().as_micros(),
            "pose sampled"
        );
        Ok(Some(stats))
    }

    /// Replace the link settings. Takes effect on the next tick and is
    /// replicated to observers when active.
    pub fn set_settings(&mut self, settings: LinkSettings) -> BoneSyncResult<()> {
        settings.validate()?;
        if settings == self.settings {
            return Ok(());
        }
        self.settings = settings;
        if self.is_active() {
            self.channels.publish_settings(settings);
        }
        info!(
            interval_ms = settings.interval.as_millis() as u64,
            latency = settings.latency,
            "link settings changed"
        );
        Ok(())
    }

    /// Messages waiting for the transport
    pub fn pending_len(&self) -> usize {
        self.channels.pending_len()
    }

    /// Move queued channel writes into `out`
    pub fn drain_into(&mut self, out: &mut Vec<PoseMessage>) {
        self.channels.drain_into(out);
    }

    /// End the link and stop pose evaluation on `hierarchy`
    pub fn teardown<H: Hierarchy + ?Sized>(self, hierarchy: &mut H) {
        hierarchy.set_pose_evaluation(false);
        info!(publishes = self.publishes, "pose encoder torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoneId, Skeleton};
    use bonesync_core::{ChangeSet, Quat, Vec3};
    use bonesync_state::ListWrite;
    use proptest::prelude::*;
    use std::time::Duration;

    fn setup(bones: usize) -> (Skeleton, PoseEncoder) {
        let skeleton = Skeleton::chain(bones);
        let map = BoneMap::from_hierarchy(&skeleton, skeleton.root(), false).unwrap();
        let encoder = PoseEncoder::new(map, LinkSettings::default()).unwrap();
        (skeleton, encoder)
    }

    fn drain(encoder: &mut PoseEncoder) -> Vec<PoseMessage> {
        let mut out = Vec::new();
        encoder.drain_into(&mut out);
        out
    }

    #[test]
    fn test_activation_publishes_full_sync() {
        let (mut skeleton, mut encoder) = setup(3);
        let stats = encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();

        assert!(skeleton.is_evaluating());
        assert_eq!(encoder.state(), EncoderState::Active);
        assert_eq!(stats.field_writes, 9);

        let messages = drain(&mut encoder);
        assert!(matches!(messages[0], PoseMessage::Settings(_)));
        assert_eq!(messages[1], PoseMessage::Position(ListWrite::Clear));
        assert_eq!(messages.iter().filter(|m| m.is_field_write()).count(), 12);
    }

    #[test]
    fn test_activation_is_one_way() {
        let (mut skeleton, mut encoder) = setup(1);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
        assert_eq!(
            encoder.activate(&mut skeleton, StateTime::ZERO).unwrap_err(),
            BoneSyncError::AlreadyActive
        );
    }

    #[test]
    fn test_tick_requires_activation() {
        let (skeleton, mut encoder) = setup(1);
        assert_eq!(
            encoder.tick(&skeleton, StateTime::ZERO).unwrap_err(),
            BoneSyncError::LinkInactive
        );
    }

    #[test]
    fn test_unchanged_pose_publishes_nothing() {
        let (mut skeleton, mut encoder) = setup(4);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
        drain(&mut encoder);

        for step in 1..=5 {
            let stats = encoder
                .tick(&skeleton, StateTime::from_millis(100 * step))
                .unwrap()
                .unwrap();
            assert_eq!(stats, PublishStats::default());
        }
        assert_eq!(encoder.pending_len(), 0);
        assert_eq!(encoder.publish_count(), 5);
    }

    #[test]
    fn test_single_field_change_is_single_write() {
        let (mut skeleton, mut encoder) = setup(4);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
        drain(&mut encoder);

        let bone = skeleton.find("bone2").unwrap();
        let mut pose = skeleton.local_transform(bone).unwrap();
        pose.rotation = Quat::from_euler(0.0, 0.4, 0.0);
        skeleton.set_local_transform(bone, pose).unwrap();

        let stats = encoder
            .tick(&skeleton, StateTime::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(stats.bones_changed, 1);
        assert_eq!(stats.field_writes, 1);
        assert_eq!(
            drain(&mut encoder),
            vec![PoseMessage::Rotation(ListWrite::Set {
                index: 2,
                value: pose.rotation
            })]
        );
    }

    #[test]
    fn test_tick_waits_for_interval() {
        let (mut skeleton, mut encoder) = setup(1);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();

        assert!(encoder
            .tick(&skeleton, StateTime::from_millis(50))
            .unwrap()
            .is_none());
        assert!(encoder
            .tick(&skeleton, StateTime::from_millis(100))
            .unwrap()
            .is_some());
        // Late tick still keeps the cadence on the grid
        assert!(encoder
            .tick(&skeleton, StateTime::from_millis(230))
            .unwrap()
            .is_some());
        assert_eq!(encoder.next_send(), StateTime::from_millis(300));
    }

    #[test]
    fn test_buffers_swap_without_reallocating() {
        let (mut skeleton, mut encoder) = setup(3);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
        let ptrs = [
            encoder.buffers[0].bones.as_ptr(),
            encoder.buffers[1].bones.as_ptr(),
        ];

        for step in 1..=3 {
            encoder
                .tick(&skeleton, StateTime::from_millis(100 * step))
                .unwrap();
        }
        assert_eq!(encoder.buffers[0].bones.as_ptr(), ptrs[0]);
        assert_eq!(encoder.buffers[1].bones.as_ptr(), ptrs[1]);
        assert_eq!(encoder.last_sample().time, StateTime::from_millis(300));
    }

    #[test]
    fn test_settings_change_is_replicated() {
        let (mut skeleton, mut encoder) = setup(1);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
        drain(&mut encoder);

        let fast = LinkSettings::new(Duration::from_millis(20), 2.0);
        encoder.set_settings(fast).unwrap();
        assert_eq!(drain(&mut encoder), vec![PoseMessage::Settings(fast)]);

        // Unchanged settings are not re-sent
        encoder.set_settings(fast).unwrap();
        assert_eq!(encoder.pending_len(), 0);

        assert!(encoder
            .set_settings(LinkSettings::new(Duration::ZERO, 1.0))
            .is_err());
    }

    #[test]
    fn test_teardown_stops_evaluation() {
        let (mut skeleton, mut encoder) = setup(1);
        encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
        encoder.teardown(&mut skeleton);
        assert!(!skeleton.is_evaluating());
    }

    proptest! {
        #[test]
        fn prop_writes_match_changed_fields(
            edits in prop::collection::vec((0usize..6, 0u8..8, -4.0f32..4.0), 0..20)
        ) {
            let (mut skeleton, mut encoder) = setup(6);
            encoder.activate(&mut skeleton, StateTime::ZERO).unwrap();
            drain(&mut encoder);

            let mut expected = vec![ChangeSet::NONE; 6];
            for (index, bits, value) in &edits {
                let bone = BoneId(index + 1);
                let mut pose = skeleton.local_transform(bone).unwrap();
                let baseline = encoder.last_sample().bones[*index];
                let changes = ChangeSet::new(*bits);
                if changes.has_position() {
                    pose.position = Vec3::new(*value, 1.0, 2.0);
                }
                if changes.has_rotation() {
                    pose.rotation = Quat::from_euler(*value, 0.0, 0.0);
                }
                if changes.has_scale() {
                    pose.scale = Vec3::splat(*value);
                }
                skeleton.set_local_transform(bone, pose).unwrap();
                expected[*index] = pose.changes_since(&baseline);
            }

            let stats = encoder
                .tick(&skeleton, StateTime::from_millis(100))
                .unwrap()
                .unwrap();
            let total: u32 = expected.iter().map(|c| c.count()).sum();
            prop_assert_eq!(stats.field_writes, total as usize);
            prop_assert_eq!(encoder.pending_len(), total as usize);
            prop_assert_eq!(
                encoder.last_sample().bones[0],
                skeleton.local_transform(BoneId(1)).unwrap()
            );
        }
    }
}
