mod flat_scene;
mod loading;
pub mod mesh_bvh;

pub use flat_scene::{
    BV_STACK_DEPTH, FlatFace, FlatMaterial, FlatNode, FlatScene, FlattenError, ShadingMode,
    TraversalStats,
};
pub use loading::ObjOpenError;
pub use mesh_bvh::MeshBvh;

use index_vec::IndexVec;

use crate::geometry::{
    Aabb, EPSILON, HitRecord, Interval, Ray, Triangle, WorldPoint, WorldVector,
};

index_vec::define_index_type! {
    pub struct FaceIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

/// One triangle of a mesh together with its shading attributes.
/// Immutable once loaded.
#[derive(Clone, Debug)]
pub struct Face {
    pub positions: Triangle<WorldPoint>,
    pub normals: Triangle<WorldVector>,
    pub face_normal: WorldVector,
    /// Position of this face in the owning mesh's face list
    pub index: FaceIdx,
    pub material: usize,
}

impl Face {
    /// The face normal is the normalized cross product of the two edges
    /// coming from the first vertex; zero for degenerate triangles.
    pub fn new(
        positions: Triangle<WorldPoint>,
        normals: Triangle<WorldVector>,
        index: FaceIdx,
        material: usize,
    ) -> Face {
        let face_normal = positions
            .normal()
            .try_normalize(EPSILON)
            .unwrap_or_else(WorldVector::zeros);

        Face {
            positions,
            normals,
            face_normal,
            index,
            material,
        }
    }

    pub fn centroid(&self) -> WorldPoint {
        self.positions.centroid()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub albedo: rgb::RGB<f32>,
}

impl Material {
    pub fn with_name(name: impl Into<String>) -> Material {
        Material {
            name: name.into(),
            albedo: rgb::RGB::new(0.8, 0.8, 0.8),
        }
    }
}

/// One mesh's faces and the hierarchy built over them.
#[derive(Clone, Debug)]
pub struct Mesh {
    name: String,
    faces: IndexVec<FaceIdx, Face>,
    bvh: MeshBvh,
}

impl Mesh {
    /// Builds the mesh's hierarchy. The face set must not be empty and each
    /// face's index field must match its position in the list.
    pub fn new(name: impl Into<String>, faces: Vec<Face>) -> Mesh {
        let faces: IndexVec<FaceIdx, Face> = IndexVec::from_vec(faces);
        assert!(!faces.is_empty());
        for (i, face) in faces.iter_enumerated() {
            assert2::debug_assert!(face.index == i);
        }

        let bvh = MeshBvh::build(&faces);

        Mesh {
            name: name.into(),
            faces,
            bvh,
        }
    }

    /// Assembles a mesh from a hand-built hierarchy, bypassing the builder.
    #[cfg(test)]
    pub(crate) fn from_parts(
        name: impl Into<String>,
        faces: IndexVec<FaceIdx, Face>,
        bvh: MeshBvh,
    ) -> Mesh {
        Mesh {
            name: name.into(),
            faces,
            bvh,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn faces(&self) -> &IndexVec<FaceIdx, Face> {
        &self.faces
    }

    pub fn bvh(&self) -> &MeshBvh {
        &self.bvh
    }
}

/// Ordered list of meshes sharing one material table.
/// Constructed once at load time; rebuilding requires a full reload.
#[derive(Clone, Debug)]
pub struct Scene {
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
}

impl Scene {
    pub fn new(meshes: Vec<Mesh>, materials: Vec<Material>) -> Scene {
        Scene { meshes, materials }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Packs all meshes into the shared fixed-stride buffers.
    pub fn flatten(&self, shading: ShadingMode) -> Result<FlatScene, FlattenError> {
        FlatScene::encode(self, shading)
    }

    pub fn print_statistics(&self) {
        for mesh in &self.meshes {
            println!("{}: {} faces", mesh.name(), mesh.faces().len());
            mesh.bvh().print_statistics();
        }
    }
}

/// Anything rays can be cast against.
pub trait Object {
    fn intersect(&self, ray: &Ray, interval: &Interval) -> Option<HitRecord>;
    fn bounding_box(&self) -> Aabb;
}

#[cfg(test)]
pub mod test {
    use super::*;
    use proptest::array::uniform3;
    use proptest::prelude::*;

    /// A face whose vertex normals all equal the face normal.
    pub fn flat_face(
        index: usize,
        material: usize,
        a: [f32; 3],
        b: [f32; 3],
        c: [f32; 3],
    ) -> Face {
        let positions = Triangle::new(a.into(), b.into(), c.into());
        let normal = positions
            .normal()
            .try_normalize(EPSILON)
            .unwrap_or_else(WorldVector::zeros);

        Face {
            positions,
            normals: Triangle::new(normal, normal, normal),
            face_normal: normal,
            index: index.into(),
            material,
        }
    }

    /// Faces spread along the x axis, so splits are deterministic.
    pub fn face_list(count: usize) -> IndexVec<FaceIdx, Face> {
        IndexVec::from_vec(
            (0..count)
                .map(|i| {
                    let x = 2.0 * i as f32;
                    flat_face(
                        i,
                        0,
                        [x, 0.0, 0.0],
                        [x + 1.0, 0.0, 0.0],
                        [x, 1.0, 0.0],
                    )
                })
                .collect(),
        )
    }

    fn axis_quad(
        faces: &mut Vec<Face>,
        corners: [[f32; 3]; 4],
        normal: [f32; 3],
        material: usize,
    ) {
        let n: WorldVector = normal.into();
        for (a, b, c) in [
            (corners[0], corners[1], corners[2]),
            (corners[0], corners[2], corners[3]),
        ] {
            faces.push(Face {
                positions: Triangle::new(a.into(), b.into(), c.into()),
                normals: Triangle::new(n, n, n),
                face_normal: n,
                index: faces.len().into(),
                material,
            });
        }
    }

    /// Twelve triangles forming the axis-aligned unit cube (0,0,0)-(1,1,1)
    /// with outward normals.
    pub fn unit_cube_faces(material: usize) -> Vec<Face> {
        let mut faces = Vec::new();
        // x = 0 and x = 1 sides
        axis_quad(
            &mut faces,
            [
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
                [0.0, 1.0, 0.0],
            ],
            [-1.0, 0.0, 0.0],
            material,
        );
        axis_quad(
            &mut faces,
            [
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [1.0, 1.0, 1.0],
                [1.0, 0.0, 1.0],
            ],
            [1.0, 0.0, 0.0],
            material,
        );
        // y = 0 and y = 1 sides
        axis_quad(
            &mut faces,
            [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0],
            ],
            [0.0, -1.0, 0.0],
            material,
        );
        axis_quad(
            &mut faces,
            [
                [0.0, 1.0, 0.0],
                [0.0, 1.0, 1.0],
                [1.0, 1.0, 1.0],
                [1.0, 1.0, 0.0],
            ],
            [0.0, 1.0, 0.0],
            material,
        );
        // z = 0 and z = 1 sides
        axis_quad(
            &mut faces,
            [
                [0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
            ],
            [0.0, 0.0, -1.0],
            material,
        );
        axis_quad(
            &mut faces,
            [
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            [0.0, 0.0, 1.0],
            material,
        );
        faces
    }

    pub fn unit_cube_scene() -> Scene {
        Scene::new(
            vec![Mesh::new("cube", unit_cube_faces(0))],
            vec![Material::with_name("default")],
        )
    }

    pub fn arb_faces(count: impl Into<proptest::collection::SizeRange>) -> BoxedStrategy<Vec<Face>> {
        let coord = (-1000i32..1000).prop_map(|n| n as f32 * 0.01);
        proptest::collection::vec(uniform3(uniform3(coord)), count)
            .prop_map(|coords| {
                coords
                    .into_iter()
                    .enumerate()
                    .map(|(i, [a, b, c])| flat_face(i, 0, a, b, c))
                    .collect()
            })
            .boxed()
    }
}
