//! Snapshot Assembler - turns channel notifications into snapshots

use bonesync_core::StateTime;
use bonesync_state::ChangeCounter;
use tracing::debug;

use crate::{InterpolationBuffer, ReplicaChannels};

/// Coalesces channel notifications into at most one snapshot per tick
#[derive(Debug)]
pub struct SnapshotAssembler {
    dirty: ChangeCounter,
    assembled: u64,
}

impl SnapshotAssembler {
    /// Subscribe a fresh dirty counter to every field channel
    pub fn subscribe(channels: &mut ReplicaChannels) -> Self {
        let dirty = ChangeCounter::new();
        channels.subscribe(&dirty);
        SnapshotAssembler {
            dirty,
            assembled: 0,
        }
    }

    /// Notifications not yet consumed by a tick
    pub fn pending(&self) -> usize {
        self.dirty.pending()
    }

    /// Snapshots appended so far
    pub fn assembled(&self) -> u64 {
        self.assembled
    }

    /// Append a snapshot of the current channel state, if any bone is readable.
    ///
    /// Used once at link start, when the initial full sync has already been
    /// applied before anyone subscribed.
    pub fn prime(
        &mut self,
        channels: &ReplicaChannels,
        now: StateTime,
        buffer: &mut InterpolationBuffer,
    ) -> bool {
        self.dirty.take();
        if channels.bone_count() == 0 {
            return false;
        }
        self.assemble(channels, now, buffer);
        true
    }

    /// Once per tick: if anything changed since the last tick, append a full
    /// snapshot read from channel state and stamped with `now`
    pub fn tick(
        &mut self,
        channels: &ReplicaChannels,
        now: StateTime,
        buffer: &mut InterpolationBuffer,
    ) -> bool {
        let notifications = self.dirty.take();
        if notifications == 0 {
            return false;
        }
        self.assemble(channels, now, buffer);
        debug!(notifications, history = buffer.len(), "snapshot assembled");
        true
    }

    fn assemble(&mut self, channels: &ReplicaChannels, now: StateTime, buffer: &mut InterpolationBuffer) {
        buffer.push(channels.snapshot(now));
        self.assembled += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonesync_core::{BoneTransform, ChangeSet, PoseSnapshot, Quat, Vec3};
    use bonesync_wire::PoseMessage;

    use crate::PoseChannels;

    fn deliver(authority: &mut PoseChannels, replica: &mut ReplicaChannels) {
        let mut messages = Vec::new();
        authority.drain_into(&mut messages);
        for message in messages {
            replica.apply(message).unwrap();
        }
    }

    fn baseline() -> PoseSnapshot {
        PoseSnapshot::from_bones(
            StateTime::ZERO,
            vec![
                BoneTransform::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::ONE),
                BoneTransform::new(
                    Vec3::new(-1.0, 0.0, 0.0),
                    Quat::from_euler(0.3, 0.0, 0.0),
                    Vec3::splat(2.0),
                ),
            ],
        )
    }

    #[test]
    fn test_prime_uses_initial_sync() {
        let mut authority = PoseChannels::new();
        let mut replica = ReplicaChannels::new();
        authority.full_sync(&baseline());
        deliver(&mut authority, &mut replica);

        let mut assembler = SnapshotAssembler::subscribe(&mut replica);
        let mut buffer = InterpolationBuffer::default();
        assert!(assembler.prime(&replica, StateTime::from_millis(3), &mut buffer));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.front().unwrap().bones, baseline().bones);
        // Nothing new arrived since priming
        assert!(!assembler.tick(&replica, StateTime::from_millis(4), &mut buffer));
    }

    #[test]
    fn test_writes_coalesce_into_one_snapshot() {
        let mut authority = PoseChannels::new();
        let mut replica = ReplicaChannels::new();
        let mut assembler = SnapshotAssembler::subscribe(&mut replica);
        let mut buffer = InterpolationBuffer::default();

        authority.full_sync(&baseline());
        deliver(&mut authority, &mut replica);
        assert_eq!(assembler.pending(), 9);

        assert!(assembler.tick(&replica, StateTime::from_millis(10), &mut buffer));
        assert_eq!(buffer.len(), 1);
        assert_eq!(assembler.pending(), 0);
        assert!(!assembler.tick(&replica, StateTime::from_millis(20), &mut buffer));
        assert_eq!(assembler.assembled(), 1);
    }

    #[test]
    fn test_snapshot_keeps_untouched_fields() {
        let mut authority = PoseChannels::new();
        let mut replica = ReplicaChannels::new();
        let mut assembler = SnapshotAssembler::subscribe(&mut replica);
        let mut buffer = InterpolationBuffer::default();

        let base = baseline();
        authority.full_sync(&base);
        deliver(&mut authority, &mut replica);
        assembler.tick(&replica, StateTime::from_millis(0), &mut buffer);

        let mut moved = base.bones[1];
        moved.scale = Vec3::splat(5.0);
        authority.publish(1, ChangeSet::SCALE, &moved).unwrap();
        deliver(&mut authority, &mut replica);
        assembler.tick(&replica, StateTime::from_millis(100), &mut buffer);

        let latest = buffer.latest().unwrap();
        assert_eq!(latest.time, StateTime::from_millis(100));
        assert_eq!(latest.bones[0], base.bones[0]);
        assert_eq!(latest.bones[1].position, base.bones[1].position);
        assert_eq!(latest.bones[1].rotation, base.bones[1].rotation);
        assert_eq!(latest.bones[1].scale, Vec3::splat(5.0));
    }

    #[test]
    fn test_settings_alone_do_not_assemble() {
        let mut replica = ReplicaChannels::new();
        let mut assembler = SnapshotAssembler::subscribe(&mut replica);
        let mut buffer = InterpolationBuffer::default();

        replica
            .apply(PoseMessage::Settings(Default::default()))
            .unwrap();
        assert!(!assembler.tick(&replica, StateTime::ZERO, &mut buffer));
        assert!(buffer.is_empty());
    }
}
