use std::collections::HashMap;

use glam::Mat4;

use crate::error::AnimationError;

/// Index of a node inside a [`Skeleton`]'s node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(u32);
impl BoneId {
    pub const ROOT: BoneId = BoneId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoneNode {
    pub name: String,
    /// Slot in the pose buffer. `None` for helper nodes that only carry a
    /// rest transform for their descendants.
    pub pose_slot: Option<u32>,
    /// Bone-to-parent rest transform.
    pub relative_transform: Mat4,
    /// Mesh space to bone space.
    pub offset_matrix: Mat4,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
}

impl BoneNode {
    pub fn new(name: impl Into<String>, relative_transform: Mat4) -> Self {
        Self {
            name: name.into(),
            pose_slot: None,
            relative_transform,
            offset_matrix: Mat4::IDENTITY,
            parent: None,
            children: vec![],
        }
    }
}

/// Immutable bone hierarchy stored as a flat arena; node 0 is the root.
///
/// Shared between every mesh instance using it, usually behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Skeleton {
    nodes: Vec<BoneNode>,
    bone_count: usize,
    by_name: HashMap<String, BoneId>,
    global_inverse_transform: Mat4,
}

impl Skeleton {
    /// Validates the arena: single root at index 0, every other node has
    /// exactly one parent that lists it as a child, no cycles, unique names,
    /// unique pose slots inside `[0, bone_count)`.
    pub fn from_nodes(
        nodes: Vec<BoneNode>,
        bone_count: usize,
        global_inverse_transform: Mat4,
    ) -> Result<Self, AnimationError> {
        if nodes.is_empty() {
            return Err(AnimationError::EmptySkeleton);
        }
        if nodes[0].parent.is_some() {
            return Err(AnimationError::MalformedHierarchy { node: 0 });
        }

        // walk from the root; a node seen twice is shared or cyclic
        let mut seen = vec![false; nodes.len()];
        let mut stack = vec![BoneId::ROOT];
        seen[0] = true;
        while let Some(id) = stack.pop() {
            for &child in &nodes[id.index()].children {
                let c = child.index();
                if c >= nodes.len() || seen[c] || nodes[c].parent != Some(id) {
                    return Err(AnimationError::MalformedHierarchy { node: c });
                }
                seen[c] = true;
                stack.push(child);
            }
        }
        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(AnimationError::MalformedHierarchy { node: orphan });
        }

        let mut by_name = HashMap::with_capacity(nodes.len());
        let mut slot_owner: Vec<Option<usize>> = vec![None; bone_count];
        for (idx, node) in nodes.iter().enumerate() {
            if by_name.insert(node.name.clone(), BoneId(idx as u32)).is_some() {
                return Err(AnimationError::DuplicateBoneName(node.name.clone()));
            }
            let Some(slot) = node.pose_slot else { continue };
            let owner = slot_owner
                .get_mut(slot as usize)
                .ok_or_else(|| AnimationError::PoseSlotOutOfRange {
                    bone: node.name.clone(),
                    slot,
                    bone_count,
                })?;
            if let Some(first) = owner {
                return Err(AnimationError::DuplicatePoseSlot {
                    slot,
                    first: nodes[*first].name.clone(),
                    second: node.name.clone(),
                });
            }
            *owner = Some(idx);
        }

        Ok(Self {
            nodes,
            bone_count,
            by_name,
            global_inverse_transform,
        })
    }

    pub fn root(&self) -> BoneId {
        BoneId::ROOT
    }

    pub fn node(&self, id: BoneId) -> &BoneNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[BoneNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Size of the pose buffer this skeleton writes into.
    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    pub fn parent(&self, id: BoneId) -> Option<BoneId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: BoneId) -> &[BoneId] {
        &self.nodes[id.index()].children
    }

    pub fn global_inverse_transform(&self) -> Mat4 {
        self.global_inverse_transform
    }

    /// Pre-order walk starting at the root, children in stored order.
    pub fn depth_first(&self) -> impl Iterator<Item = BoneId> + '_ {
        let mut stack = vec![BoneId::ROOT];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.children(id).iter().rev().copied());
            Some(id)
        })
    }
}

/// Appends nodes parent-first and wires up child lists.
#[derive(Default)]
pub struct SkeletonBuilder {
    nodes: Vec<BoneNode>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent` (or as the root when `None`).
    pub fn add(&mut self, parent: Option<BoneId>, mut node: BoneNode) -> BoneId {
        let id = BoneId(self.nodes.len() as u32);
        node.parent = parent;
        node.children.clear();
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// Adds a node that owns pose slot `slot`.
    pub fn add_bone(
        &mut self,
        parent: Option<BoneId>,
        name: impl Into<String>,
        slot: u32,
        relative_transform: Mat4,
        offset_matrix: Mat4,
    ) -> BoneId {
        let mut node = BoneNode::new(name, relative_transform);
        node.pose_slot = Some(slot);
        node.offset_matrix = offset_matrix;
        self.add(parent, node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn build(self, bone_count: usize, global_inverse_transform: Mat4) -> Result<Skeleton, AnimationError> {
        Skeleton::from_nodes(self.nodes, bone_count, global_inverse_transform)
    }
}
