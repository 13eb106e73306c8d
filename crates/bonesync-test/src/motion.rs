//! Deterministic skeleton motion for simulations

use std::f32::consts::TAU;
use std::time::Duration;

use bonesync_core::{BoneSyncResult, BoneTransform, Quat, StateTime, Vec3};
use bonesync_pose::{traverse, BoneId, Hierarchy, Skeleton};

/// Drives the authority's source skeleton once per simulation step
pub trait Motion {
    fn drive(&mut self, skeleton: &mut Skeleton, now: StateTime) -> BoneSyncResult<()>;
}

/// Leaves the skeleton untouched
#[derive(Clone, Copy, Debug, Default)]
pub struct Still;

impl Motion for Still {
    fn drive(&mut self, _skeleton: &mut Skeleton, _now: StateTime) -> BoneSyncResult<()> {
        Ok(())
    }
}

/// Every non-root bone swings about Z and bobs along Y, phase-shifted by
/// depth. Scale never changes.
#[derive(Clone, Debug)]
pub struct SwayMotion {
    /// Peak swing angle in radians
    pub amplitude: f32,
    /// Peak bob distance
    pub bob: f32,
    pub period: Duration,
    bones: Vec<BoneId>,
}

impl SwayMotion {
    pub fn new(skeleton: &Skeleton) -> BoneSyncResult<Self> {
        Ok(SwayMotion {
            amplitude: 0.4,
            bob: 0.05,
            period: Duration::from_secs(2),
            bones: traverse(skeleton, skeleton.root(), false)?,
        })
    }

    /// Local pose of the `index`-th non-root bone at `now`
    pub fn pose_at(&self, index: usize, now: StateTime) -> BoneTransform {
        let phase = (now.as_secs_f64() / self.period.as_secs_f64()) as f32 * TAU;
        let wave = (phase + index as f32 * 0.5).sin();
        BoneTransform::new(
            Vec3::new(0.0, 1.0 + self.bob * wave, 0.0),
            Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), self.amplitude * wave),
            Vec3::ONE,
        )
    }
}

impl Motion for SwayMotion {
    fn drive(&mut self, skeleton: &mut Skeleton, now: StateTime) -> BoneSyncResult<()> {
        for (index, bone) in self.bones.iter().enumerate() {
            skeleton.set_local_transform(*bone, self.pose_at(index, now))?;
        }
        Ok(())
    }
}
