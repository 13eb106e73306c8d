//! Articulated hierarchies

use bonesync_core::{BoneSyncError, BoneSyncResult, BoneTransform};

/// Node handle inside one hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(pub usize);

/// A tree of bones with local transforms.
///
/// Children are returned in their declared order; traversal relies on it.
pub trait Hierarchy {
    fn children(&self, bone: BoneId) -> BoneSyncResult<&[BoneId]>;

    fn local_transform(&self, bone: BoneId) -> BoneSyncResult<BoneTransform>;

    fn set_local_transform(&mut self, bone: BoneId, transform: BoneTransform)
        -> BoneSyncResult<()>;

    /// Toggle local pose evaluation (animation playback) on this hierarchy
    fn set_pose_evaluation(&mut self, enabled: bool);
}

#[derive(Debug, Clone)]
struct Bone {
    name: String,
    parent: Option<BoneId>,
    children: Vec<BoneId>,
    local: BoneTransform,
}

/// Arena-backed skeleton
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    evaluating: bool,
}

impl Skeleton {
    /// Skeleton holding only a root bone at identity
    pub fn new(root_name: impl Into<String>) -> Self {
        Skeleton {
            bones: vec![Bone {
                name: root_name.into(),
                parent: None,
                children: Vec::new(),
                local: BoneTransform::IDENTITY,
            }],
            evaluating: false,
        }
    }

    /// Root, then a single chain of `len` bones named `bone0..`
    pub fn chain(len: usize) -> Self {
        let mut skeleton = Skeleton::new("root");
        let mut parent = skeleton.root();
        for i in 0..len {
            parent = skeleton.push_bone(parent, format!("bone{}", i), BoneTransform::IDENTITY);
        }
        skeleton
    }

    pub fn root(&self) -> BoneId {
        BoneId(0)
    }

    /// Number of bones including the root
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Attach a new bone as the last child of `parent`
    pub fn add_bone(
        &mut self,
        parent: BoneId,
        name: impl Into<String>,
        local: BoneTransform,
    ) -> BoneSyncResult<BoneId> {
        self.node(parent)?;
        Ok(self.push_bone(parent, name.into(), local))
    }

    fn push_bone(&mut self, parent: BoneId, name: String, local: BoneTransform) -> BoneId {
        let id = BoneId(self.bones.len());
        self.bones.push(Bone {
            name,
            parent: Some(parent),
            children: Vec::new(),
            local,
        });
        self.bones[parent.0].children.push(id);
        id
    }

    pub fn name(&self, bone: BoneId) -> Option<&str> {
        self.bones.get(bone.0).map(|b| b.name.as_str())
    }

    pub fn parent(&self, bone: BoneId) -> Option<BoneId> {
        self.bones.get(bone.0).and_then(|b| b.parent)
    }

    /// First bone with the given name
    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.bones.iter().position(|b| b.name == name).map(BoneId)
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating
    }

    fn node(&self, bone: BoneId) -> BoneSyncResult<&Bone> {
        self.bones
            .get(bone.0)
            .ok_or(BoneSyncError::UnknownNode(bone.0))
    }
}

impl Hierarchy for Skeleton {
    fn children(&self, bone: BoneId) -> BoneSyncResult<&[BoneId]> {
        Ok(&self.node(bone)?.children)
    }

    fn local_transform(&self, bone: BoneId) -> BoneSyncResult<BoneTransform> {
        Ok(self.node(bone)?.local)
    }

    fn set_local_transform(
        &mut self,
        bone: BoneId,
        transform: BoneTransform,
    ) -> BoneSyncResult<()> {
        let node = self
            .bones
            .get_mut(bone.0)
            .ok_or(BoneSyncError::UnknownNode(bone.0))?;
        node.local = transform;
        Ok(())
    }

    fn set_pose_evaluation(&mut self, enabled: bool) {
        self.evaluating = enabled;
    }
}
