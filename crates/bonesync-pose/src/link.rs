//! Observer link - assembly, delayed interpolation and application
//!
//! A link starts once the authority's initial full sync has been applied to
//! the replica channels. The bone count check happens here, once; a
//! mismatch fails the link and is never re-checked per tick. After start
//! the channel lengths are fixed: `Add` and `Clear` writes are refused.

use bonesync_core::{
    BoneSyncError, BoneSyncResult, InterpolationMode, LinkSettings, PoseSnapshot, StateTime,
};
use bonesync_state::ListOperation;
use bonesync_wire::PoseMessage;
use tracing::{debug, error, info};

use crate::{
    apply_pose, BoneId, BoneMap, Hierarchy, InterpolationBuffer, ReplicaChannels,
    SnapshotAssembler,
};

/// Observer side of one pose link
#[derive(Debug)]
pub struct ObserverLink {
    map: BoneMap,
    channels: ReplicaChannels,
    assembler: SnapshotAssembler,
    buffer: InterpolationBuffer,
    /// Authority settings in effect for the current tick
    settings: LinkSettings,
    applied: u64,
}

impl ObserverLink {
    /// Set up the link on `hierarchy`.
    ///
    /// Fails with `BoneCountMismatch` if the traversal from `root` does not
    /// yield exactly as many bones as the replica channels carry. On success
    /// pose evaluation is disabled on `hierarchy` and the current channel
    /// state becomes the first history entry.
    pub fn start<H: Hierarchy + ?Sized>(
        mut channels: ReplicaChannels,
        hierarchy: &mut H,
        root: BoneId,
        include_root: bool,
        mode: InterpolationMode,
        now: StateTime,
    ) -> BoneSyncResult<Self> {
        let map = BoneMap::from_hierarchy(&*hierarchy, root, include_root)?;
        if let Err(err) = map.ensure_len(channels.bone_count()) {
            error!(
                replicated = channels.bone_count(),
                local = map.len(),
                "bone count mismatch, observer link not started"
            );
            return Err(err);
        }

        hierarchy.set_pose_evaluation(false);

        let mut assembler = SnapshotAssembler::subscribe(&mut channels);
        let mut buffer = InterpolationBuffer::new(mode);
        assembler.prime(&channels, now, &mut buffer);
        let settings = channels.settings().unwrap_or_default();

        info!(
            bones = map.len(),
            interval_ms = settings.interval.as_millis() as u64,
            latency = settings.latency,
            ?mode,
            "observer link started"
        );

        Ok(ObserverLink {
            map,
            channels,
            assembler,
            buffer,
            settings,
            applied: 0,
        })
    }

    pub fn bone_count(&self) -> usize {
        self.map.len()
    }

    pub fn settings(&self) -> LinkSettings {
        self.settings
    }

    pub fn channels(&self) -> &ReplicaChannels {
        &self.channels
    }

    pub fn buffer(&self) -> &InterpolationBuffer {
        &self.buffer
    }

    /// Snapshots assembled since start, the primed one included
    pub fn assembled(&self) -> u64 {
        self.assembler.assembled()
    }

    /// Ticks on which a pose was written to the hierarchy
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Apply one delivered channel message. Only `Set` writes and settings
    /// are accepted once the link has started.
    pub fn receive(&mut self, message: PoseMessage) -> BoneSyncResult<()> {
        if let Some(operation @ (ListOperation::Add | ListOperation::Clear)) = message.operation() {
            return Err(BoneSyncError::StructuralWrite(format!("{:?}", operation)));
        }
        self.channels.apply(message)?;
        Ok(())
    }

    /// One observer tick: adopt replicated settings, assemble a snapshot if
    /// anything changed, then interpolate at the delayed target time and
    /// write the result onto `hierarchy`.
    ///
    /// Returns the applied pose, or `None` while history is empty.
    pub fn tick<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &mut H,
        now: StateTime,
    ) -> BoneSyncResult<Option<&PoseSnapshot>> {
        if let Some(settings) = self.channels.settings() {
            if settings != self.settings {
                debug!(
                    interval_ms = settings.interval.as_millis() as u64,
                    latency = settings.latency,
                    "adopted replicated settings"
                );
                self.settings = settings;
            }
        }

        self.assembler.tick(&self.channels, now, &mut self.buffer);

        let Some(pose) = self.buffer.sample(now, &self.settings) else {
            return Ok(None);
        };
        apply_pose(pose, &self.map, hierarchy)?;
        self.applied += 1;
        Ok(Some(pose))
    }

    pub fn teardown(self) {
        info!(
            assembled = self.assembler.assembled(),
            applied = self.applied,
            "observer link torn down"
        );
    }
}
