mod building;
mod printing;

use index_vec::IndexVec;

use crate::geometry::{Aabb, FloatType};
use crate::scene::FaceIdx;

/// Maximum number of faces stored directly in a leaf node.
pub const LEAF_CAPACITY: usize = 2;

/// Minimum extent of a bounding box dimension. Boxes around coplanar
/// geometry are padded to this thickness so the slab test never sees a
/// zero-measure box.
pub const BV_MIN_DELTA: FloatType = 0.01;

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

/// One node of the hierarchy. Either an internal node (child links set, no
/// face links) or a leaf (up to two face links, no child links).
#[derive(Clone, Debug)]
pub struct BvNode {
    pub bounds: Aabb,
    pub left: Option<NodeIdx>,
    pub right: Option<NodeIdx>,
    pub faces: [Option<FaceIdx>; LEAF_CAPACITY],
}

impl BvNode {
    fn with_bounds(bounds: Aabb) -> BvNode {
        BvNode {
            bounds,
            left: None,
            right: None,
            faces: [None; LEAF_CAPACITY],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn face_count(&self) -> usize {
        self.faces.iter().flatten().count()
    }
}

/// Bounding volume hierarchy over one mesh's faces.
/// Nodes live in an append-only arena; node 0 is always the root and covers
/// every face of the mesh. Built once at load time, never mutated afterward.
#[derive(Clone, Debug)]
pub struct MeshBvh {
    nodes: IndexVec<NodeIdx, BvNode>,
}

impl MeshBvh {
    pub const ROOT: NodeIdx = NodeIdx::from_raw_unchecked(0);

    /// Wraps a hand-built node arena, bypassing the builder.
    #[cfg(test)]
    pub(crate) fn from_nodes(nodes: IndexVec<NodeIdx, BvNode>) -> MeshBvh {
        MeshBvh { nodes }
    }

    pub fn root(&self) -> &BvNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, idx: NodeIdx) -> &BvNode {
        &self.nodes[idx]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeIdx, &BvNode)> {
        self.nodes.iter_enumerated()
    }

    /// Number of nodes along the longest root-to-leaf path, root included.
    /// This is also the high-water mark of the traversal stack.
    pub fn depth(&self) -> usize {
        self.depth_recursive(Self::ROOT)
    }

    fn depth_recursive(&self, idx: NodeIdx) -> usize {
        let node = &self.nodes[idx];
        let left = node.left.map_or(0, |i| self.depth_recursive(i));
        let right = node.right.map_or(0, |i| self.depth_recursive(i));
        1 + left.max(right)
    }
}
