//! Pose Sampler - fixed traversal order and snapshot capture

use bonesync_core::{BoneSyncResult, PoseSnapshot, StateTime};

use crate::{BoneId, Hierarchy};

/// Pre-order depth-first walk from `root`.
///
/// A node is visited before its children, children in declared order. The
/// root itself is part of the result only when `include_root` is set.
pub fn traverse<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    root: BoneId,
    include_root: bool,
) -> BoneSyncResult<Vec<BoneId>> {
    let mut order = Vec::new();
    let mut stack = vec![root];

    while let Some(bone) = stack.pop() {
        if bone != root || include_root {
            order.push(bone);
        }
        // Reverse so the first child is popped first
        stack.extend(hierarchy.children(bone)?.iter().rev().copied());
    }

    Ok(order)
}

/// Flattened bone index mapping of one side of a link.
///
/// Index `i` names the same logical bone on the authority and every observer;
/// the mapping is computed once and cached for the link's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneMap {
    bones: Vec<BoneId>,
}

impl BoneMap {
    pub fn new(bones: Vec<BoneId>) -> Self {
        BoneMap { bones }
    }

    /// Mapping from a pre-order traversal of `hierarchy`
    pub fn from_hierarchy<H: Hierarchy + ?Sized>(
        hierarchy: &H,
        root: BoneId,
        include_root: bool,
    ) -> BoneSyncResult<Self> {
        Ok(BoneMap::new(traverse(hierarchy, root, include_root)?))
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    /// Capture every mapped bone into `out`, reusing its storage
    pub fn capture_into<H: Hierarchy + ?Sized>(
        &self,
        hierarchy: &H,
        time: StateTime,
        out: &mut PoseSnapshot,
    ) -> BoneSyncResult<()> {
        out.time = time;
        out.bones.clear();
        for &bone in &self.bones {
            out.bones.push(hierarchy.local_transform(bone)?);
        }
        Ok(())
    }

    /// Capture every mapped bone, stamped with `time`
    pub fn capture<H: Hierarchy + ?Sized>(
        &self,
        hierarchy: &H,
        time: StateTime,
    ) -> BoneSyncResult<PoseSnapshot> {
        let mut snapshot = PoseSnapshot::new(time, 0);
        snapshot.bones.reserve_exact(self.bones.len());
        self.capture_into(hierarchy, time, &mut snapshot)?;
        Ok(snapshot)
    }
}
