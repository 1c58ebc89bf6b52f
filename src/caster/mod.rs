mod machinery;
mod worker;

pub use machinery::{CastHandle, CastProgress, cast};

use assert2::assert;
use bon::bon;
use nalgebra::Unit;

use crate::geometry::{EPSILON, FloatType, Ray, ScreenPoint, ScreenSize, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug)]
pub struct CastSettings {
    pub tile_size: std::num::NonZeroU32,
}

/// Fixed pinhole projection mapping each pixel to one ray.
/// One ray per pixel, no sampling.
#[derive(Copy, Clone, Debug)]
pub struct Projection {
    center: WorldPoint,

    resolution: ScreenSize,

    up: Unit<WorldVector>,
    right: Unit<WorldVector>,
    film_origin_offset: WorldVector,

    /// Distance between pixels in meters
    pixel_pitch: FloatType,
}

#[bon]
impl Projection {
    #[builder]
    pub fn new(
        center: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        resolution: ScreenSize,
        film_width: FloatType,
        focal_length: FloatType,
    ) -> Self {
        let forward = Unit::try_new(forward, EPSILON).expect("Forward vector must be non-zero");
        let up = Unit::try_new(up, EPSILON).expect("Up vector must be non-zero");
        let right = Unit::try_new(forward.cross(&up), EPSILON)
            .expect("`up` and `forward` must be linearly independent");
        let up = Unit::new_normalize(right.cross(&forward));

        assert!(resolution.x > 0);
        assert!(resolution.y > 0);
        assert!(film_width > 0.0);
        assert!(focal_length > 0.0);

        let pixel_pitch = film_width / (resolution.x as FloatType);
        let film_origin_u = (resolution.x - 1) as FloatType * pixel_pitch / 2.0;
        let film_origin_v = (resolution.y - 1) as FloatType * pixel_pitch / 2.0;
        let film_origin_offset = -forward.as_ref() * focal_length
            + right.as_ref() * film_origin_u
            - up.as_ref() * film_origin_v;

        Projection {
            center,
            resolution,
            up,
            right,
            film_origin_offset,
            pixel_pitch,
        }
    }
}

impl Projection {
    pub fn resolution(&self) -> ScreenSize {
        self.resolution
    }

    /// Ray through the center of the given pixel.
    pub fn ray_through(&self, point: &ScreenPoint) -> Ray {
        let film_point_offset = self.film_origin_offset
            + self.up.as_ref() * (point.y as FloatType * self.pixel_pitch)
            - self.right.as_ref() * (point.x as FloatType * self.pixel_pitch);

        Ray::new(self.center, -film_point_offset)
    }
}
