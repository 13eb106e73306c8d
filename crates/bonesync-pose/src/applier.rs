//! Pose Applier - writes snapshots back onto a hierarchy

use bonesync_core::{BoneSyncError, BoneSyncResult, PoseSnapshot};

use crate::{BoneMap, Hierarchy};

/// Write `snapshot.bones[i]` onto `map.bones()[i]` for every `i`.
///
/// Fails with `BoneCountMismatch` before writing anything if the lengths
/// differ.
pub fn apply_pose<H: Hierarchy + ?Sized>(
    snapshot: &PoseSnapshot,
    map: &BoneMap,
    hierarchy: &mut H,
) -> BoneSyncResult<()> {
    map.ensure_len(snapshot.len())?;
    for (bone, transform) in map.bones().iter().zip(snapshot.bones.iter()) {
        hierarchy.set_local_transform(*bone, *transform)?;
    }
    Ok(())
}

impl BoneMap {
    /// Fail with `BoneCountMismatch` unless this map has `expected` bones
    pub fn ensure_len(&self, expected: usize) -> BoneSyncResult<()> {
        if self.len() != expected {
            return Err(BoneSyncError::BoneCountMismatch {
                expected,
                actual: self.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Skeleton;
    use bonesync_core::{BoneTransform, Quat, StateTime, Vec3};

    fn posed_chain() -> Skeleton {
        let mut s = Skeleton::chain(4);
        for i in 0..4 {
            let bone = s.find(&format!("bone{}", i)).unwrap();
            let f = i as f32;
            s.set_local_transform(
                bone,
                BoneTransform::new(
                    Vec3::new(f, 0.5 * f, -f),
                    Quat::from_euler(0.1 * f, 0.2, -0.3 * f),
                    Vec3::splat(1.0 + 0.25 * f),
                ),
            )
            .unwrap();
        }
        s
    }

    #[test]
    fn test_capture_apply_round_trip_is_exact() {
        let source = posed_chain();
        let mut target = Skeleton::chain(4);

        let src_map = BoneMap::from_hierarchy(&source, source.root(), true).unwrap();
        let dst_map = BoneMap::from_hierarchy(&target, target.root(), true).unwrap();
        dst_map.ensure_len(src_map.len()).unwrap();

        let snapshot = src_map.capture(&source, StateTime::ZERO).unwrap();
        apply_pose(&snapshot, &dst_map, &mut target).unwrap();

        let echoed = dst_map.capture(&target, StateTime::ZERO).unwrap();
        assert_eq!(echoed, snapshot);
    }

    #[test]
    fn test_short_snapshot_writes_nothing() {
        let source = posed_chain();
        let mut target = Skeleton::chain(4);
        let map = BoneMap::from_hierarchy(&target, target.root(), true).unwrap();

        let mut snapshot = map.capture(&source, StateTime::ZERO).unwrap();
        snapshot.bones.truncate(2);
        let before = map.capture(&target, StateTime::ZERO).unwrap();

        assert_eq!(
            apply_pose(&snapshot, &map, &mut target).unwrap_err(),
            BoneSyncError::BoneCountMismatch {
                expected: 2,
                actual: 5
            }
        );
        assert_eq!(map.capture(&target, StateTime::ZERO).unwrap(), before);
    }

    #[test]
    fn test_ensure_len_mismatch() {
        let target = Skeleton::chain(2);
        let map = BoneMap::from_hierarchy(&target, target.root(), false).unwrap();
        assert_eq!(
            map.ensure_len(5).unwrap_err(),
            BoneSyncError::BoneCountMismatch {
                expected: 5,
                actual: 2
            }
        );
    }
}
