use super::{Aabb, FloatType, Ray};

impl Aabb {
    /// Slab test against the box.
    /// Returns the first and last intersection distance along the ray.
    /// The box is hit iff the returned near distance is strictly smaller than
    /// the far distance.
    ///
    /// The multiplication is NaN if the ray starts inside a slab's bounding
    /// plane and is parallel to it. In this case we blend to +-infinity so
    /// that the slab imposes no constraint.
    pub fn intersect(&self, ray: &Ray) -> (FloatType, FloatType) {
        let to_box_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::NEG_INFINITY } else { x });
        let to_box_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::INFINITY } else { x });

        // Correctly ordered (near <= far) per axis
        let componentwise_near = to_box_min.zip_map(&to_box_max, FloatType::min);
        let componentwise_far = to_box_min.zip_map(&to_box_max, FloatType::max);

        let near = componentwise_near
            .x
            .max(componentwise_near.y)
            .max(componentwise_near.z);
        let far = componentwise_far
            .x
            .min(componentwise_far.y)
            .min(componentwise_far.z);

        (near, far)
    }

    pub fn is_hit_by(&self, ray: &Ray) -> bool {
        let (near, far) = self.intersect(ray);
        near < far
    }
}
