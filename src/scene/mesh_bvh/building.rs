use index_vec::IndexVec;
use ordered_float::OrderedFloat;

use crate::geometry::Aabb;
use crate::scene::{Face, FaceIdx};

use super::{BV_MIN_DELTA, BvNode, LEAF_CAPACITY, MeshBvh, NodeIdx};

impl MeshBvh {
    /// Builds the hierarchy over the given faces.
    /// The face set must not be empty.
    pub fn build(faces: &IndexVec<FaceIdx, Face>) -> MeshBvh {
        assert!(!faces.is_empty());

        let bounds = Aabb::from_points(vertices_iter(faces.indices(), faces))
            .expect("face set is non-empty")
            .pad_thin_axes(BV_MIN_DELTA);

        let mut bvh = MeshBvh {
            nodes: IndexVec::new(),
        };
        bvh.nodes.push(BvNode::with_bounds(bounds));

        let mut order: Vec<FaceIdx> = faces.indices().collect();
        bvh.subdivide(Self::ROOT, &mut order, faces);

        bvh
    }

    fn subdivide(
        &mut self,
        node: NodeIdx,
        order: &mut [FaceIdx],
        faces: &IndexVec<FaceIdx, Face>,
    ) {
        if order.len() <= LEAF_CAPACITY {
            for (slot, face) in self.nodes[node].faces.iter_mut().zip(order.iter()) {
                *slot = Some(*face);
            }
            return;
        }

        let axis = self.nodes[node].bounds.largest_axis();
        order.sort_by_key(|fi| OrderedFloat(faces[*fi].centroid()[axis]));

        let mid = order.len() / 2;
        let (left_faces, right_faces) = order.split_at_mut(mid);

        // Both children are appended before either subtree, so siblings get
        // adjacent indices and grandchildren follow them.
        let left = (!left_faces.is_empty()).then(|| {
            self.nodes
                .push(BvNode::with_bounds(group_bounds(left_faces, faces)))
        });
        let right = (!right_faces.is_empty()).then(|| {
            self.nodes
                .push(BvNode::with_bounds(group_bounds(right_faces, faces)))
        });
        self.nodes[node].left = left;
        self.nodes[node].right = right;

        if let Some(left) = left {
            self.subdivide(left, left_faces, faces);
        }
        if let Some(right) = right {
            self.subdivide(right, right_faces, faces);
        }

        // A child padded on a degenerate axis can stick out of this node's
        // box; grow the box so both children stay contained.
        let mut bounds = self.nodes[node].bounds.clone();
        for child in [left, right].into_iter().flatten() {
            bounds = bounds.union(&self.nodes[child].bounds);
        }
        self.nodes[node].bounds = bounds;
    }
}

fn group_bounds(order: &[FaceIdx], faces: &IndexVec<FaceIdx, Face>) -> Aabb {
    Aabb::from_points(vertices_iter(order.iter().copied(), faces))
        .expect("face group is non-empty")
        .pad_thin_axes(BV_MIN_DELTA)
}

/// Iterates over vertices of the selected faces
fn vertices_iter<'a>(
    order: impl IntoIterator<Item = FaceIdx> + 'a,
    faces: &'a IndexVec<FaceIdx, Face>,
) -> impl Iterator<Item = crate::geometry::WorldPoint> + 'a {
    order
        .into_iter()
        .flat_map(|fi| faces[fi].positions.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test::{arb_faces, face_list, flat_face};
    use assert2::{assert, let_assert};
    use test_case::test_case;
    use test_strategy::proptest;

    /// Walks the tree checking the structural invariants:
    /// leaves hold 1..=2 faces and no children, internal nodes hold no faces,
    /// children's boxes are contained in the parent's box, child indices are
    /// greater than the parent's, and every face is reachable exactly once.
    fn check_invariants(bvh: &MeshBvh, faces: &IndexVec<FaceIdx, Face>) {
        let mut seen = vec![false; faces.len()];
        check_invariants_recursive(bvh, MeshBvh::ROOT, faces, &mut seen);
        assert!(seen.into_iter().all(|s| s), "every face must be reachable");
    }

    fn check_invariants_recursive(
        bvh: &MeshBvh,
        idx: NodeIdx,
        faces: &IndexVec<FaceIdx, Face>,
        seen: &mut [bool],
    ) {
        let node = bvh.node(idx);

        if node.is_leaf() {
            assert!(node.face_count() >= 1);
            assert!(node.face_count() <= LEAF_CAPACITY);
            for fi in node.faces.iter().flatten() {
                assert!(!seen[fi.raw() as usize]);
                seen[fi.raw() as usize] = true;
                for vertex in faces[*fi].positions.iter() {
                    assert!(node.bounds.contains_point(vertex));
                }
            }
        } else {
            assert!(node.faces == [None, None]);
            for child in [node.left, node.right].into_iter().flatten() {
                assert!(child > idx);
                assert!(node.bounds.contains_box(&bvh.node(child).bounds));
                check_invariants_recursive(bvh, child, faces, seen);
            }
        }
    }

    /// Expected depth of the balanced median split:
    /// D(n) = 1 for n <= 2, otherwise 1 + D(ceil(n / 2))
    fn expected_depth(n: usize) -> usize {
        if n <= LEAF_CAPACITY {
            1
        } else {
            1 + expected_depth(n.div_ceil(2))
        }
    }

    #[test_case(1 ; "single_face")]
    #[test_case(2 ; "two_faces")]
    fn small_sets_build_a_single_leaf(count: usize) {
        let faces = face_list(count);
        let bvh = MeshBvh::build(&faces);

        assert!(bvh.node_count() == 1);
        let root = bvh.root();
        assert!(root.is_leaf());
        assert!(root.face_count() == count);
        // Remaining slots stay at the sentinel
        for slot in root.faces.iter().skip(count) {
            assert!(*slot == None);
        }
    }

    #[test]
    fn three_faces_split_two_plus_one() {
        let faces = face_list(3);
        let bvh = MeshBvh::build(&faces);

        assert!(bvh.node_count() == 3);
        let root = bvh.root();
        assert!(!root.is_leaf());

        let_assert!(Some(left) = root.left);
        let_assert!(Some(right) = root.right);
        let left = bvh.node(left);
        let right = bvh.node(right);
        assert!(left.is_leaf());
        assert!(right.is_leaf());
        // floor(3 / 2) faces go left, the remainder right
        assert!(left.face_count() == 1);
        assert!(right.face_count() == 2);
    }

    #[test]
    fn splits_along_longest_axis() {
        // Faces spread along y; the first split must separate low from high y.
        let faces = IndexVec::from_vec(vec![
            flat_face(0, 0, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            flat_face(1, 0, [0.0, 10.0, 0.0], [1.0, 10.0, 0.0], [0.0, 10.0, 1.0]),
            flat_face(2, 0, [0.0, 20.0, 0.0], [1.0, 20.0, 0.0], [0.0, 20.0, 1.0]),
            flat_face(3, 0, [0.0, 30.0, 0.0], [1.0, 30.0, 0.0], [0.0, 30.0, 1.0]),
        ]);
        let bvh = MeshBvh::build(&faces);

        let_assert!(Some(left) = bvh.root().left);
        let_assert!(Some(right) = bvh.root().right);
        // Low-y faces (y = 0, 10) land left, high-y faces (y = 20, 30) right
        assert!(bvh.node(left).bounds.max.y < 20.0);
        assert!(bvh.node(right).bounds.min.y == 20.0);
    }

    #[test]
    fn coplanar_faces_get_padded_boxes() {
        // All geometry in the z = 0 plane; every box must still be thick.
        let faces = IndexVec::from_vec(vec![
            flat_face(0, 0, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            flat_face(1, 0, [2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]),
            flat_face(2, 0, [4.0, 0.0, 0.0], [5.0, 0.0, 0.0], [4.0, 1.0, 0.0]),
        ]);
        let bvh = MeshBvh::build(&faces);

        for (_, node) in bvh.iter_nodes() {
            let extent = node.bounds.extent();
            assert!(extent.x >= BV_MIN_DELTA);
            assert!(extent.y >= BV_MIN_DELTA);
            assert!(extent.z >= BV_MIN_DELTA);
        }
    }

    #[test]
    fn padded_child_boxes_stay_contained() {
        // The right half is coplanar at the parent's upper x bound, so its
        // padded box would stick out without the parent growing over it.
        let faces = IndexVec::from_vec(vec![
            flat_face(0, 0, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            flat_face(1, 0, [2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]),
            flat_face(2, 0, [5.0, 0.0, 0.0], [5.0, 1.0, 0.0], [5.0, 0.0, 1.0]),
            flat_face(3, 0, [5.0, 0.0, 1.0], [5.0, 1.0, 1.0], [5.0, 1.0, 0.0]),
        ]);
        let bvh = MeshBvh::build(&faces);

        let_assert!(Some(right) = bvh.root().right);
        let right = bvh.node(right);
        assert!(right.bounds.extent().x >= BV_MIN_DELTA);
        assert!(bvh.root().bounds.contains_box(&right.bounds));
    }

    #[proptest]
    fn built_tree_upholds_invariants(#[strategy(arb_faces(1..50))] faces: Vec<Face>) {
        let faces = IndexVec::from_vec(faces);
        let bvh = MeshBvh::build(&faces);

        check_invariants(&bvh, &faces);

        // Median split gives a balanced tree of a known shape
        let leaves = faces.len().div_ceil(LEAF_CAPACITY);
        assert!(bvh.node_count() == 2 * leaves - 1);
        assert!(bvh.depth() == expected_depth(faces.len()));
    }

    #[proptest]
    fn root_covers_all_vertices(#[strategy(arb_faces(1..50))] faces: Vec<Face>) {
        let faces = IndexVec::from_vec(faces);
        let bvh = MeshBvh::build(&faces);

        for face in faces.iter() {
            for vertex in face.positions.iter() {
                assert!(bvh.root().bounds.contains_point(vertex));
            }
        }
    }
}
