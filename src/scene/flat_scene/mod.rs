mod ray_intersection;

pub use ray_intersection::TraversalStats;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::geometry::{Aabb, Triangle, WorldPoint, WorldVector};
use crate::scene::mesh_bvh::BvNode;
use crate::scene::{Face, Material, Scene};

/// Capacity of the per-ray traversal stack. The stack's high-water mark is
/// the tree depth, so this supports up to 2^16 leaves per mesh
/// (ceil(log2(max_faces / leaf_capacity)) plus margin). Trees deeper than
/// this are rejected when the scene is flattened.
pub const BV_STACK_DEPTH: usize = 16;

const NO_LINK: i32 = -1;

/// How hit normals are produced: the flat face normal, or the vertex normals
/// interpolated with the barycentric hit coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ShadingMode {
    Flat,
    #[default]
    Smooth,
}

/// One hierarchy node as laid out in the shared node buffer,
/// 12 scalar slots. Child and face links are local to the owning mesh's
/// region, -1 when absent.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlatNode {
    min: [f32; 3],
    /// Homogeneous 1, keeps the corner consumable as a vec4
    min_w: f32,
    max: [f32; 3],
    left: i32,
    right: i32,
    face0: i32,
    face1: i32,
    _pad: i32,
}

impl FlatNode {
    fn from_node(node: &BvNode) -> FlatNode {
        FlatNode {
            min: node.bounds.min.coords.into(),
            min_w: 1.0,
            max: node.bounds.max.coords.into(),
            left: encode_link(node.left.map(|i| i.raw())),
            right: encode_link(node.right.map(|i| i.raw())),
            face0: encode_link(node.faces[0].map(|i| i.raw())),
            face1: encode_link(node.faces[1].map(|i| i.raw())),
            _pad: 0,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.min.into(), self.max.into())
    }

    /// Node index of the left child within the same mesh region
    pub fn left(&self) -> Option<u32> {
        decode_link(self.left)
    }

    pub fn right(&self) -> Option<u32> {
        decode_link(self.right)
    }

    /// Face index within the same mesh region, slot 0 or 1
    pub fn face(&self, slot: usize) -> Option<u32> {
        decode_link([self.face0, self.face1][slot])
    }

    pub fn is_leaf(&self) -> bool {
        self.left == NO_LINK && self.right == NO_LINK
    }
}

fn encode_link(link: Option<u32>) -> i32 {
    link.map_or(NO_LINK, |i| i as i32)
}

fn decode_link(link: i32) -> Option<u32> {
    (link != NO_LINK).then_some(link as u32)
}

/// One face as laid out in the shared face buffer, 28 scalar slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlatFace {
    p0: [f32; 3],
    _pad0: f32,
    p1: [f32; 3],
    _pad1: f32,
    p2: [f32; 3],
    _pad2: f32,
    n0: [f32; 3],
    _pad3: f32,
    n1: [f32; 3],
    _pad4: f32,
    n2: [f32; 3],
    _pad5: f32,
    face_normal: [f32; 3],
    material: u32,
}

impl FlatFace {
    fn from_face(face: &Face) -> FlatFace {
        FlatFace {
            p0: face.positions[0].coords.into(),
            _pad0: 0.0,
            p1: face.positions[1].coords.into(),
            _pad1: 0.0,
            p2: face.positions[2].coords.into(),
            _pad2: 0.0,
            n0: face.normals[0].into(),
            _pad3: 0.0,
            n1: face.normals[1].into(),
            _pad4: 0.0,
            n2: face.normals[2].into(),
            _pad5: 0.0,
            face_normal: face.face_normal.into(),
            material: face.material as u32,
        }
    }

    pub fn positions(&self) -> Triangle<WorldPoint> {
        Triangle::new(self.p0.into(), self.p1.into(), self.p2.into())
    }

    pub fn normals(&self) -> Triangle<WorldVector> {
        Triangle::new(self.n0.into(), self.n1.into(), self.n2.into())
    }

    pub fn face_normal(&self) -> WorldVector {
        self.face_normal.into()
    }

    pub fn material(&self) -> u32 {
        self.material
    }
}

/// One material as laid out in the material buffer, 8 scalar slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlatMaterial {
    albedo: [f32; 4],
    _reserved: [f32; 4],
}

impl FlatMaterial {
    fn from_material(material: &Material) -> FlatMaterial {
        FlatMaterial {
            albedo: [
                material.albedo.r,
                material.albedo.g,
                material.albedo.b,
                1.0,
            ],
            _reserved: [0.0; 4],
        }
    }

    pub fn albedo(&self) -> rgb::RGB<f32> {
        rgb::RGB::new(self.albedo[0], self.albedo[1], self.albedo[2])
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlattenError {
    #[error("scene contains no meshes")]
    EmptyScene,

    #[error("mesh {mesh}: tree depth {depth} exceeds the traversal stack capacity {limit}")]
    TreeTooDeep {
        mesh: usize,
        depth: usize,
        limit: usize,
    },

    #[error("mesh {mesh}: {count} nodes do not fit the region stride {stride}")]
    NodeRegionOverflow {
        mesh: usize,
        count: usize,
        stride: usize,
    },

    #[error("mesh {mesh}: {count} faces do not fit the region stride {stride}")]
    FaceRegionOverflow {
        mesh: usize,
        count: usize,
        stride: usize,
    },

    #[error("mesh {mesh}: node {node} links to face {face}, mesh has {len} faces")]
    FaceIndexOutOfRange {
        mesh: usize,
        node: usize,
        face: usize,
        len: usize,
    },

    #[error("mesh {mesh}: face {face} references material {material}, scene has {len} materials")]
    MaterialIndexOutOfRange {
        mesh: usize,
        face: usize,
        material: usize,
        len: usize,
    },
}

/// All meshes of a scene packed into three shared fixed-stride buffers.
/// Every mesh occupies one max_nodes_per_mesh slice of the node buffer and
/// one max_faces_per_mesh slice of the face buffer regardless of its own
/// size; unused slots are zeroed. Read-only once encoded, safe to share
/// across any number of traversal threads.
#[derive(Clone, Debug)]
pub struct FlatScene {
    nodes: Vec<FlatNode>,
    faces: Vec<FlatFace>,
    materials: Vec<FlatMaterial>,
    mesh_count: usize,
    max_nodes_per_mesh: usize,
    max_faces_per_mesh: usize,
    shading: ShadingMode,
}

impl FlatScene {
    pub fn encode(scene: &Scene, shading: ShadingMode) -> Result<FlatScene, FlattenError> {
        let meshes = scene.meshes();
        if meshes.is_empty() {
            return Err(FlattenError::EmptyScene);
        }

        let max_nodes_per_mesh = meshes
            .iter()
            .map(|m| m.bvh().node_count())
            .max()
            .unwrap_or(0);
        let max_faces_per_mesh = meshes.iter().map(|m| m.faces().len()).max().unwrap_or(0);

        let mut nodes = vec![FlatNode::zeroed(); meshes.len() * max_nodes_per_mesh];
        let mut faces = vec![FlatFace::zeroed(); meshes.len() * max_faces_per_mesh];

        for (mesh_idx, mesh) in meshes.iter().enumerate() {
            let bvh = mesh.bvh();

            let depth = bvh.depth();
            if depth > BV_STACK_DEPTH {
                return Err(FlattenError::TreeTooDeep {
                    mesh: mesh_idx,
                    depth,
                    limit: BV_STACK_DEPTH,
                });
            }
            // The strides are maxima over all meshes, so these cannot
            // trigger unless the maxima were computed wrong.
            if bvh.node_count() > max_nodes_per_mesh {
                return Err(FlattenError::NodeRegionOverflow {
                    mesh: mesh_idx,
                    count: bvh.node_count(),
                    stride: max_nodes_per_mesh,
                });
            }
            if mesh.faces().len() > max_faces_per_mesh {
                return Err(FlattenError::FaceRegionOverflow {
                    mesh: mesh_idx,
                    count: mesh.faces().len(),
                    stride: max_faces_per_mesh,
                });
            }

            let node_base = mesh_idx * max_nodes_per_mesh;
            for (idx, node) in bvh.iter_nodes() {
                for face_link in node.faces.iter().flatten() {
                    if face_link.index() >= mesh.faces().len() {
                        return Err(FlattenError::FaceIndexOutOfRange {
                            mesh: mesh_idx,
                            node: idx.index(),
                            face: face_link.index(),
                            len: mesh.faces().len(),
                        });
                    }
                }
                nodes[node_base + idx.index()] = FlatNode::from_node(node);
            }

            let face_base = mesh_idx * max_faces_per_mesh;
            for (idx, face) in mesh.faces().iter_enumerated() {
                if face.material >= scene.materials().len() {
                    return Err(FlattenError::MaterialIndexOutOfRange {
                        mesh: mesh_idx,
                        face: idx.index(),
                        material: face.material,
                        len: scene.materials().len(),
                    });
                }
                faces[face_base + idx.index()] = FlatFace::from_face(face);
            }
        }

        let materials = scene
            .materials()
            .iter()
            .map(FlatMaterial::from_material)
            .collect();

        Ok(FlatScene {
            nodes,
            faces,
            materials,
            mesh_count: meshes.len(),
            max_nodes_per_mesh,
            max_faces_per_mesh,
            shading,
        })
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }

    /// Stride of one mesh's slice of the node buffer, in nodes
    pub fn max_nodes_per_mesh(&self) -> usize {
        self.max_nodes_per_mesh
    }

    /// Stride of one mesh's slice of the face buffer, in faces
    pub fn max_faces_per_mesh(&self) -> usize {
        self.max_faces_per_mesh
    }

    pub fn shading(&self) -> ShadingMode {
        self.shading
    }

    pub fn node(&self, mesh: usize, local: u32) -> &FlatNode {
        &self.nodes[mesh * self.max_nodes_per_mesh + local as usize]
    }

    pub fn face(&self, mesh: usize, local: u32) -> &FlatFace {
        &self.faces[mesh * self.max_faces_per_mesh + local as usize]
    }

    pub fn material(&self, index: usize) -> &FlatMaterial {
        &self.materials[index]
    }

    /// Raw view of the node buffer for upload to an external consumer
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    pub fn face_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.faces)
    }

    pub fn material_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.materials)
    }
}
