use arrayvec::ArrayVec;
use nalgebra::Unit;

use crate::geometry::{Aabb, HitRecord, Interval, Ray};
use crate::scene::Object;

use super::{BV_STACK_DEPTH, FlatFace, FlatScene, ShadingMode};

/// Work counters of one traversal, for diagnostics and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Nodes popped off the stack, whether or not their box was hit
    pub nodes_visited: usize,
    /// Faces that went through the ray-triangle test
    pub faces_tested: usize,
}

impl Object for FlatScene {
    fn intersect(&self, ray: &Ray, interval: &Interval) -> Option<HitRecord> {
        self.intersect_with_stats(ray, interval).0
    }

    fn bounding_box(&self) -> Aabb {
        (0..self.mesh_count)
            .map(|mesh| self.node(mesh, 0).bounds())
            .reduce(|a, b| a.union(&b))
            .expect("encoded scenes contain at least one mesh")
    }
}

impl FlatScene {
    /// Returns the closest intersection within the interval across every
    /// mesh, or None.
    ///
    /// Each mesh's tree is searched depth-first with a bounded local stack;
    /// the stack cannot overflow because tree depth is validated when the
    /// scene is encoded. No state is shared between calls, so any number of
    /// rays may traverse the same scene concurrently.
    pub fn intersect_with_stats(
        &self,
        ray: &Ray,
        interval: &Interval,
    ) -> (Option<HitRecord>, TraversalStats) {
        let mut stats = TraversalStats::default();
        let mut best: Option<HitRecord> = None;
        let mut closest = interval.max;

        for mesh in 0..self.mesh_count {
            let mut stack = ArrayVec::<u32, BV_STACK_DEPTH>::new();
            stack.push(0);

            while let Some(local) = stack.pop() {
                stats.nodes_visited += 1;
                let node = self.node(mesh, local);

                if !node.bounds().is_hit_by(ray) {
                    continue;
                }

                if let Some(left) = node.left() {
                    stack.push(left);
                }
                if let Some(right) = node.right() {
                    stack.push(right);
                }

                for slot in 0..2 {
                    let Some(face_idx) = node.face(slot) else {
                        continue;
                    };
                    let face = self.face(mesh, face_idx);
                    stats.faces_tested += 1;

                    let restricted = Interval::new(interval.min, closest);
                    if let Some((t, uv)) = face.positions().intersect(ray, &restricted) {
                        closest = t;
                        best = Some(self.hit_record(ray, t, &uv, face, mesh));
                    }
                }
            }
        }

        (best, stats)
    }

    fn hit_record(
        &self,
        ray: &Ray,
        t: f32,
        uv: &crate::geometry::BarycentricCoordinates<f32>,
        face: &FlatFace,
        mesh: usize,
    ) -> HitRecord {
        let normal = match self.shading {
            ShadingMode::Flat => face.face_normal(),
            ShadingMode::Smooth => uv.interpolate_triangle(&face.normals()),
        };

        HitRecord {
            t,
            point: ray.point_at(t),
            normal: Unit::new_normalize(normal),
            material: face.material() as usize,
            mesh,
        }
    }
}
