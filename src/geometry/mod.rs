mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

pub use aabb::Aabb;
pub use triangle::{BarycentricCoordinates, Triangle};

use nalgebra::Unit;

pub type FloatType = f32;

/// Shared tolerance for near-parallel rejection and normalization checks.
pub const EPSILON: FloatType = 1e-5;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;

pub type ScreenPoint = nalgebra::Point2<u32>;
pub type ScreenSize = nalgebra::Vector2<u32>;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

/// Range of hit distances along a ray that count as valid intersections.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Interval {
    pub min: FloatType,
    pub max: FloatType,
}

impl Interval {
    pub fn new(min: FloatType, max: FloatType) -> Interval {
        Interval { min, max }
    }

    /// Everything in front of the ray origin, offset by epsilon to avoid
    /// self-intersection at the origin.
    pub fn positive_universe() -> Interval {
        Interval {
            min: EPSILON,
            max: FloatType::MAX,
        }
    }

    pub fn contains(&self, x: FloatType) -> bool {
        self.min <= x && x <= self.max
    }

    pub fn surrounds(&self, x: FloatType) -> bool {
        self.min < x && x < self.max
    }
}

#[derive(Clone, Debug)]
pub struct HitRecord {
    pub t: FloatType,
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
    pub material: usize,
    pub mesh: usize,
}
