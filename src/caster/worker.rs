use image::RgbaImage;

use crate::geometry::{Interval, ScreenPoint};
use crate::scene::Object;
use crate::screen_block::ScreenBlock;
use crate::util::Rgba;

use super::Projection;

/// Casts one ray per pixel of the tile, writing the results into the
/// tile-local buffer.
pub fn cast_tile<O: Object>(
    scene: &O,
    projection: &Projection,
    tile: &ScreenBlock,
    buffer: &mut RgbaImage,
) {
    for point in tile.internal_points() {
        let color = cast_pixel(scene, projection, &point);

        let buffer_position = point - tile.min;
        buffer.put_pixel(buffer_position.x, buffer_position.y, color_to_image(color));
    }
}

/// Hits are visualized by how directly the surface faces the ray;
/// misses stay transparent black.
fn cast_pixel<O: Object>(scene: &O, projection: &Projection, point: &ScreenPoint) -> Rgba {
    let ray = projection.ray_through(point);

    if let Some(intersection) = scene.intersect(&ray, &Interval::positive_universe()) {
        let dot = ray.direction.dot(&intersection.normal).abs();
        Rgba::new(dot, dot, dot, 1.0)
    } else {
        Rgba::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Maps a 0-1 f32 rgba pixel to pixel type compatible with module image.
pub fn color_to_image(color: Rgba) -> image::Rgba<u8> {
    image::Rgba([
        (color.r * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.g * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.b * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ScreenSize, WorldPoint, WorldVector};
    use crate::scene::ShadingMode;
    use crate::scene::test::unit_cube_scene;
    use assert2::assert;

    fn cube_projection() -> Projection {
        // Looks down the -x axis at the unit cube from the front
        Projection::builder()
            .center(WorldPoint::new(5.0, 0.5, 0.5))
            .forward(WorldVector::new(-1.0, 0.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(ScreenSize::new(16, 16))
            .film_width(36e-3)
            .focal_length(50e-3)
            .build()
    }

    #[test]
    fn center_pixel_hits_the_cube() {
        let flat = unit_cube_scene().flatten(ShadingMode::Smooth).unwrap();
        let projection = cube_projection();

        let mut buffer = RgbaImage::new(16, 16);
        let tile = ScreenBlock::from_size(ScreenSize::new(16, 16));
        cast_tile(&flat, &projection, &tile, &mut buffer);

        // The +x cube face fills the view center and faces the ray head-on
        let center = buffer.get_pixel(8, 8);
        assert!(center.0[3] == 255);
        assert!(center.0[0] > 200);
    }

    #[test]
    fn tile_offset_maps_into_local_buffer() {
        let flat = unit_cube_scene().flatten(ShadingMode::Smooth).unwrap();
        let projection = cube_projection();

        let mut buffer = RgbaImage::new(8, 8);
        let tile = ScreenBlock::new(ScreenPoint::new(4, 4), ScreenPoint::new(12, 12));
        cast_tile(&flat, &projection, &tile, &mut buffer);

        // Screen pixel (8, 8) lands at buffer position (4, 4)
        let center = buffer.get_pixel(4, 4);
        assert!(center.0[3] == 255);
    }

    #[test]
    fn color_conversion_saturates() {
        assert!(color_to_image(Rgba::new(2.0, -1.0, 0.5, 1.0)) == image::Rgba([255, 0, 128, 255]));
    }
}
