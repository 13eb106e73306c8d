//! Per-field replication channels of one pose link
//!
//! Position, rotation and scale each travel on their own ordered channel.
//! Write order is preserved per channel; there is no ordering across them.

use bonesync_core::{
    BoneSyncResult, BoneTransform, ChangeSet, LinkSettings, PoseSnapshot, Quat, StateTime, Vec3,
};
use bonesync_state::{ChangeCounter, ListChange, ReplicaList, SyncList};
use bonesync_wire::PoseMessage;

/// Authority-side channels
#[derive(Debug, Clone, Default)]
pub struct PoseChannels {
    positions: SyncList<Vec3>,
    rotations: SyncList<Quat>,
    scales: SyncList<Vec3>,
    pending_settings: Option<LinkSettings>,
}

impl PoseChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bone_count(&self) -> usize {
        self.positions.count()
    }

    /// Rebuild every channel from `snapshot`: `Clear` then one `Add` per bone.
    ///
    /// Returns the number of field writes queued, clears excluded.
    pub fn full_sync(&mut self, snapshot: &PoseSnapshot) -> usize {
        self.positions.clear();
        self.rotations.clear();
        self.scales.clear();
        for bone in &snapshot.bones {
            self.positions.push(bone.position);
            self.rotations.push(bone.rotation);
            self.scales.push(bone.scale);
        }
        snapshot.len() * 3
    }

    /// Write each field of bone `index` whose flag is set in `changes`.
    ///
    /// Returns the number of field writes queued.
    pub fn publish(
        &mut self,
        index: usize,
        changes: ChangeSet,
        transform: &BoneTransform,
    ) -> BoneSyncResult<usize> {
        if changes.has_position() {
            self.positions.set(index, transform.position)?;
        }
        if changes.has_rotation() {
            self.rotations.set(index, transform.rotation)?;
        }
        if changes.has_scale() {
            self.scales.set(index, transform.scale)?;
        }
        Ok(changes.count() as usize)
    }

    /// Queue a settings update; a later call before draining replaces it
    pub fn publish_settings(&mut self, settings: LinkSettings) {
        self.pending_settings = Some(settings);
    }

    /// Messages waiting for the transport
    pub fn pending_len(&self) -> usize {
        self.positions.pending_len()
            + self.rotations.pending_len()
            + self.scales.pending_len()
            + usize::from(self.pending_settings.is_some())
    }

    /// Move every queued write into `out`, settings first, then each channel
    /// in write order
    pub fn drain_into(&mut self, out: &mut Vec<PoseMessage>) {
        if let Some(settings) = self.pending_settings.take() {
            out.push(PoseMessage::Settings(settings));
        }
        out.extend(self.positions.drain_writes().map(PoseMessage::Position));
        out.extend(self.rotations.drain_writes().map(PoseMessage::Rotation));
        out.extend(self.scales.drain_writes().map(PoseMessage::Scale));
    }

    /// Last published value of bone `index`
    pub fn bone(&self, index: usize) -> Option<BoneTransform> {
        read_bone(
            self.positions.get(index),
            self.rotations.get(index),
            self.scales.get(index),
        )
    }
}

/// Observer-side channels
#[derive(Debug, Clone, Default)]
pub struct ReplicaChannels {
    positions: ReplicaList<Vec3>,
    rotations: ReplicaList<Quat>,
    scales: ReplicaList<Vec3>,
    settings: Option<LinkSettings>,
}

impl ReplicaChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `counter` on all three field channels
    pub fn subscribe(&mut self, counter: &ChangeCounter) {
        self.positions.subscribe(counter.clone());
        self.rotations.subscribe(counter.clone());
        self.scales.subscribe(counter.clone());
    }

    /// Apply one delivered message.
    ///
    /// Field writes return the change they caused; settings return `None`
    /// and notify nobody. Settings that fail validation are refused and the
    /// previous ones stay in effect.
    pub fn apply(&mut self, message: PoseMessage) -> BoneSyncResult<Option<ListChange>> {
        let change = match message {
            PoseMessage::Position(write) => self.positions.apply(write)?,
            PoseMessage::Rotation(write) => self.rotations.apply(write)?,
            PoseMessage::Scale(write) => self.scales.apply(write)?,
            PoseMessage::Settings(settings) => {
                settings.validate()?;
                self.settings = Some(settings);
                return Ok(None);
            }
        };
        Ok(Some(change))
    }

    /// Settings last received from the authority
    pub fn settings(&self) -> Option<LinkSettings> {
        self.settings
    }

    /// Bones readable on all three channels
    pub fn bone_count(&self) -> usize {
        self.positions
            .count()
            .min(self.rotations.count())
            .min(self.scales.count())
    }

    /// Latest delivered value of bone `index`
    pub fn bone(&self, index: usize) -> Option<BoneTransform> {
        read_bone(
            self.positions.get(index),
            self.rotations.get(index),
            self.scales.get(index),
        )
    }

    /// Full snapshot of current channel state, stamped with `time`
    pub fn snapshot(&self, time: StateTime) -> PoseSnapshot {
        let bones = (0..self.bone_count())
            .filter_map(|i| self.bone(i))
            .collect();
        PoseSnapshot::from_bones(time, bones)
    }
}

fn read_bone(
    position: Option<&Vec3>,
    rotation: Option<&Quat>,
    scale: Option<&Vec3>,
) -> Option<BoneTransform> {
    Some(BoneTransform::new(*position?, *rotation?, *scale?))
}
