//! Bone transforms and change detection

use std::ops::{BitOr, BitOrAssign};

use crate::{Quat, Vec3};

/// Which fields of a bone transform differ between two samples (1 byte)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeSet(pub u8);

impl ChangeSet {
    pub const NONE: ChangeSet = ChangeSet(0);
    pub const POSITION: ChangeSet = ChangeSet(0b0000_0001);
    pub const ROTATION: ChangeSet = ChangeSet(0b0000_0010);
    pub const SCALE: ChangeSet = ChangeSet(0b0000_0100);
    pub const ALL: ChangeSet = ChangeSet(0b0000_0111);

    #[inline]
    pub fn new(bits: u8) -> Self {
        ChangeSet(bits & Self::ALL.0)
    }

    #[inline]
    pub fn contains(self, other: ChangeSet) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn has_position(self) -> bool {
        self.contains(Self::POSITION)
    }

    #[inline]
    pub fn has_rotation(self) -> bool {
        self.contains(Self::ROTATION)
    }

    #[inline]
    pub fn has_scale(self) -> bool {
        self.contains(Self::SCALE)
    }

    /// Number of fields flagged
    #[inline]
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn insert(&mut self, other: ChangeSet) {
        self.0 |= other.0;
    }
}

impl BitOr for ChangeSet {
    type Output = ChangeSet;

    #[inline]
    fn bitor(self, rhs: ChangeSet) -> ChangeSet {
        ChangeSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: ChangeSet) {
        self.insert(rhs);
    }
}

/// Local transform of one bone relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Fields of `self` that differ from `prev`
    pub fn changes_since(&self, prev: &BoneTransform) -> ChangeSet {
        let mut changes = ChangeSet::NONE;
        if self.position != prev.position {
            changes |= ChangeSet::POSITION;
        }
        if self.rotation != prev.rotation {
            changes |= ChangeSet::ROTATION;
        }
        if self.scale != prev.scale {
            changes |= ChangeSet::SCALE;
        }
        changes
    }

    /// Elementwise interpolation: lerp on position and scale, slerp on rotation
    pub fn interpolate(&self, other: &BoneTransform, t: f32) -> BoneTransform {
        BoneTransform {
            position: self.position.lerp(&other.position, t),
            rotation: self.rotation.slerp(&other.rotation, t),
            scale: self.scale.lerp(&other.scale, t),
        }
    }
}
