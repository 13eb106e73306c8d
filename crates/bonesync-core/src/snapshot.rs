//! Pose snapshots - the complete set of bone transforms at one instant

use crate::{BoneTransform, StateTime};

/// Timestamped pose of a whole hierarchy.
///
/// Index `i` names the same logical bone in every snapshot of a link; the
/// mapping is fixed when the link is set up.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    pub time: StateTime,
    pub bones: Vec<BoneTransform>,
}

impl PoseSnapshot {
    /// Snapshot of `bone_count` identity transforms
    pub fn new(time: StateTime, bone_count: usize) -> Self {
        Self {
            time,
            bones: vec![BoneTransform::IDENTITY; bone_count],
        }
    }

    pub fn from_bones(time: StateTime, bones: Vec<BoneTransform>) -> Self {
        Self { time, bones }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, index: usize) -> Option<&BoneTransform> {
        self.bones.get(index)
    }

    /// Overwrite `self` with the interpolation of `d0` and `d1` at `t`.
    ///
    /// Reuses the existing bone storage. The result has as many bones as
    /// the shorter of the two inputs.
    pub fn interpolate_from(&mut self, d0: &PoseSnapshot, d1: &PoseSnapshot, t: f64) {
        self.time = d0.time.lerp(d1.time, t);
        let tf = t as f32;
        self.bones.clear();
        self.bones.extend(
            d0.bones
                .iter()
                .zip(d1.bones.iter())
                .map(|(a, b)| a.interpolate(b, tf)),
        );
    }

    /// Interpolate between two snapshots into a new snapshot
    pub fn interpolate(d0: &PoseSnapshot, d1: &PoseSnapshot, t: f64) -> PoseSnapshot {
        let mut out = PoseSnapshot::new(d0.time, d0.len());
        out.interpolate_from(d0, d1, t);
        out
    }

    /// Copy another snapshot in place without reallocating
    pub fn copy_from(&mut self, src: &PoseSnapshot) {
        self.time = src.time;
        self.bones.clear();
        self.bones.extend_from_slice(&src.bones);
    }
}
