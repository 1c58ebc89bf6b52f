use super::{FloatType, WorldPoint, WorldVector};

/// Axis-aligned box given by its two extreme corners.
#[derive(Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl Aabb {
    pub fn new(min: WorldPoint, max: WorldPoint) -> Aabb {
        Aabb { min, max }
    }

    /// Smallest box covering all points of the iterator, None if it is empty.
    pub fn from_points(points: impl IntoIterator<Item = WorldPoint>) -> Option<Aabb> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut aabb = Aabb {
            min: first,
            max: first,
        };
        for p in points {
            aabb.grow_to_include(&p);
        }
        Some(aabb)
    }

    pub fn grow_to_include(&mut self, p: &WorldPoint) {
        self.min = WorldPoint::from(self.min.coords.zip_map(&p.coords, FloatType::min));
        self.max = WorldPoint::from(self.max.coords.zip_map(&p.coords, FloatType::max));
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: WorldPoint::from(self.min.coords.zip_map(&other.min.coords, FloatType::min)),
            max: WorldPoint::from(self.max.coords.zip_map(&other.max.coords, FloatType::max)),
        }
    }

    pub fn extent(&self) -> WorldVector {
        self.max - self.min
    }

    /// Index of the axis with the largest extent.
    /// Ties go to the lowest axis index (x before y before z).
    pub fn largest_axis(&self) -> usize {
        let extent = self.extent();
        let largest = extent.x.max(extent.y).max(extent.z);
        if extent.x == largest {
            0
        } else if extent.y == largest {
            1
        } else {
            2
        }
    }

    /// Grows the max corner on every axis thinner than min_extent, so that
    /// no dimension of the box is degenerate.
    pub fn pad_thin_axes(mut self, min_extent: FloatType) -> Aabb {
        for axis in 0..3 {
            if self.max[axis] - self.min[axis] < min_extent {
                self.max[axis] += min_extent;
            }
        }
        self
    }

    pub fn contains_point(&self, p: &WorldPoint) -> bool {
        (0..3).all(|axis| self.min[axis] <= p[axis] && p[axis] <= self.max[axis])
    }

    pub fn contains_box(&self, other: &Aabb) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }
}
