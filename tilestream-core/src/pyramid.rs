//! Tile pyramid arithmetic.
//!
//! Pure functions converting between basic coordinates, pyramid levels, tile
//! indices and native pixel rectangles. All functions expect a valid image
//! size; check with [`verify_size`] first.
//!
//! A level `z` of an image whose native level is `max` scales the image by
//! `2^(z - max)`; at that scale the image is cut into `TILE_SIZE` squares.
//! Equivalently each tile at level `z` covers `TILE_SIZE * 2^(max - z)`
//! native pixels per side.

use tilestream_model::ids::TILE_ID_MAX_INDEX;
use tilestream_model::{
    BasicBBox, ImageSize, PyramidLevel, RegionOfInterest, TileCoords2D,
    TileCoords3D, TilePixelRect,
};

/// Side length, in pixels, of every tile at its own level.
pub const TILE_SIZE: u32 = 1024;

/// Coarsest level the fetcher is allowed to request by default.
pub const TILE_MIN_REQUEST_LEVEL: u32 = 10;

/// Deepest level ever requested. Up to here every tile index fits a
/// [`TileId`](tilestream_model::TileId): an image at most `2^max` pixels wide
/// has at most `2^(z - log2(TILE_SIZE))` columns at level `z >= max`.
pub const TILE_MAX_REQUEST_LEVEL: u32 =
    TILE_SIZE.trailing_zeros() + (TILE_ID_MAX_INDEX + 1).trailing_zeros();

/// Scale factor between level `z` and the native level.
pub fn level_scale(level: PyramidLevel) -> f64 {
    2f64.powi(level.offset_from_native())
}

/// Native pixels covered by one tile side at `level`.
pub fn level_tile_pixel_size(level: PyramidLevel) -> f64 {
    TILE_SIZE as f64 / level_scale(level)
}

fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        u32::BITS - (value - 1).leading_zeros()
    }
}

/// Smallest level whose native tile grid covers the image at 1:1.
pub fn base_image_level(size: ImageSize) -> u32 {
    ceil_log2(size.max_dimension())
}

/// [`base_image_level`] clamped into `[min, max]`.
///
/// The lower bound wins when the range is empty, so images smaller than the
/// minimum request level are still requested at that level.
pub fn clamped_image_level(size: ImageSize, min: u32, max: u32) -> u32 {
    base_image_level(size).min(max).max(min)
}

/// Level matching the on-screen resolution of `roi`, clamped into
/// `[min, max]` like [`clamped_image_level`].
///
/// Works on the unrounded virtual size, so 1024.4 virtual pixels already
/// need level 11. A log2 within `1e-9` of an integer counts as that integer.
pub fn region_image_level(roi: &RegionOfInterest, min: u32, max: u32) -> u32 {
    let (w, h) = roi.virtual_size();
    let longest = w.max(h);
    let base = if longest > 1.0 {
        (longest.log2() - 1e-9).ceil() as u32
    } else {
        0
    };
    base.min(max).max(min)
}

/// Tile grid dimensions `(columns, rows)` at `level`.
pub fn size_to_level_columns_rows(
    size: ImageSize,
    level: PyramidLevel,
) -> (u32, u32) {
    let scale = level_scale(level);
    let columns = (scale * size.w as f64 / TILE_SIZE as f64).ceil();
    let rows = (scale * size.h as f64 / TILE_SIZE as f64).ceil();
    (columns as u32, rows as u32)
}

fn clamp_index(value: f64, max: u32) -> u32 {
    // NaN and negatives land on 0.
    if !(value > 0.0) {
        0
    } else if value >= max as f64 {
        max
    } else {
        value as u32
    }
}

/// Tile index containing the basic point `basic`, floor-rounded and clamped
/// to the grid on each axis.
pub fn basic_to_tile_coords_2d(
    basic: [f64; 2],
    size: ImageSize,
    level: PyramidLevel,
) -> TileCoords2D {
    let tile_pixel_size = level_tile_pixel_size(level);
    let (columns, rows) = size_to_level_columns_rows(size, level);

    let x = (size.w as f64 * basic[0] / tile_pixel_size).floor();
    let y = (size.h as f64 * basic[1] / tile_pixel_size).floor();

    TileCoords2D::new(
        clamp_index(x, columns.saturating_sub(1)),
        clamp_index(y, rows.saturating_sub(1)),
    )
}

/// Native pixel footprint of `tile`, clipped at the right and bottom edges.
pub fn tile_to_pixel_coords_2d(
    tile: TileCoords2D,
    size: ImageSize,
    level: PyramidLevel,
) -> TilePixelRect {
    let tile_pixel_size = level_tile_pixel_size(level);
    let x = tile.x as f64 * tile_pixel_size;
    let y = tile.y as f64 * tile_pixel_size;
    let w = tile_pixel_size.min(size.w as f64 - x).max(0.0);
    let h = tile_pixel_size.min(size.h as f64 - y).max(0.0);

    TilePixelRect::new(x as u32, y as u32, w as u32, h as u32)
}

/// `true` when two tiles, possibly at different levels, cover intersecting
/// image area.
///
/// Across levels the coarser tile is projected onto the finer grid, where it
/// spans `2^dz` indices per axis; the finer tile must fall inside that span
/// on both axes.
pub fn has_overlap_2d(a: TileCoords3D, b: TileCoords3D) -> bool {
    if a.z == b.z {
        return a.x == b.x && a.y == b.y;
    }

    let (coarse, fine) = if a.z < b.z { (a, b) } else { (b, a) };
    let shift = fine.z - coarse.z;
    let project = |index: u32| index.checked_shr(shift).unwrap_or(0);

    project(fine.x) == coarse.x && project(fine.y) == coarse.y
}

/// Every tile index in the closed rectangle spanned by two corners.
///
/// When `top_left.x > bottom_right.x` the x range wraps past the last column
/// back to column 0, which models a horizontally wrapping image whose region
/// straddles the seam. The y axis never wraps.
pub fn corners_to_tiles_coords_2d(
    top_left: TileCoords2D,
    bottom_right: TileCoords2D,
    size: ImageSize,
    level: PyramidLevel,
) -> Vec<TileCoords2D> {
    let xs: Vec<u32> = if top_left.x > bottom_right.x {
        let (columns, _) = size_to_level_columns_rows(size, level);
        let last = columns.saturating_sub(1);
        (top_left.x..=last).chain(0..=bottom_right.x).collect()
    } else {
        (top_left.x..=bottom_right.x).collect()
    };

    let mut tiles = Vec::with_capacity(
        xs.len()
            * (bottom_right.y.saturating_sub(top_left.y) as usize + 1),
    );
    for x in xs {
        for y in top_left.y..=bottom_right.y {
            tiles.push(TileCoords2D::new(x, y));
        }
    }
    tiles
}

/// Tiles at `level` covering a basic-coordinate box.
pub fn bbox_to_tiles_coords_2d(
    bbox: &BasicBBox,
    size: ImageSize,
    level: PyramidLevel,
) -> Vec<TileCoords2D> {
    let top_left = basic_to_tile_coords_2d(bbox.top_left(), size, level);
    let bottom_right =
        basic_to_tile_coords_2d(bbox.bottom_right(), size, level);
    corners_to_tiles_coords_2d(top_left, bottom_right, size, level)
}

/// Tiling is only possible for sizes with two non-zero sides.
pub fn verify_size(size: ImageSize) -> bool {
    size.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: ImageSize = ImageSize::new(2048, 1024);

    fn level(z: u32) -> PyramidLevel {
        PyramidLevel::new(z, base_image_level(SIZE))
    }

    #[test]
    fn tile_pixel_size_times_scale_is_tile_size() {
        for max in 0..20 {
            for z in 0..30 {
                let level = PyramidLevel::new(z, max);
                assert_eq!(
                    level_tile_pixel_size(level) * level_scale(level),
                    TILE_SIZE as f64,
                    "level {level}"
                );
            }
        }
    }

    #[test]
    fn base_level_matches_known_sizes() {
        assert_eq!(base_image_level(ImageSize::new(1024, 1024)), 10);
        assert_eq!(base_image_level(ImageSize::new(1025, 1)), 11);
        assert_eq!(base_image_level(ImageSize::new(2048, 1024)), 11);
        assert_eq!(base_image_level(ImageSize::new(1, 1)), 0);
        assert_eq!(base_image_level(ImageSize::new(1, 2)), 1);
    }

    #[test]
    fn base_level_is_monotonic_in_longest_side() {
        let mut previous = 0;
        for side in 1..5000u32 {
            let current = base_image_level(ImageSize::new(side, 1));
            assert!(current >= previous, "side {side}");
            previous = current;
        }
    }

    #[test]
    fn clamped_level_respects_bounds() {
        assert_eq!(clamped_image_level(ImageSize::new(300, 200), 10, 11), 10);
        assert_eq!(clamped_image_level(ImageSize::new(9000, 10), 10, 11), 11);
        assert_eq!(clamped_image_level(ImageSize::new(1500, 10), 10, 11), 11);
        assert_eq!(clamped_image_level(ImageSize::new(1000, 10), 10, 11), 10);
        // Empty range: minimum wins.
        assert_eq!(clamped_image_level(ImageSize::new(64, 64), 10, 9), 10);
    }

    #[test]
    fn deepest_request_level_keeps_indices_representable() {
        assert_eq!(TILE_MAX_REQUEST_LEVEL, 38);
        let size = ImageSize::new(1, 1);
        let level = PyramidLevel::new(TILE_MAX_REQUEST_LEVEL, 0);
        let (columns, rows) = size_to_level_columns_rows(size, level);
        assert!(columns - 1 <= TILE_ID_MAX_INDEX);
        assert!(rows - 1 <= TILE_ID_MAX_INDEX);
    }

    #[test]
    fn region_level_uses_fractional_virtual_size() {
        let region = |w: f64, h: f64| {
            RegionOfInterest::new(BasicBBox::FULL, 1.0 / w, 1.0 / h)
        };
        assert_eq!(region_image_level(&region(1024.4, 512.2), 10, 11), 11);
        assert_eq!(region_image_level(&region(1024.0, 512.0), 10, 11), 10);
        assert_eq!(region_image_level(&region(2048.0, 1024.0), 10, 11), 11);
        assert_eq!(region_image_level(&region(3000.0, 1500.0), 10, 13), 12);
        assert_eq!(region_image_level(&region(0.5, 0.25), 0, 11), 0);
        // Far past the native level.
        assert_eq!(region_image_level(&region(1e12, 1e12), 10, 11), 11);
    }

    #[test]
    fn columns_and_rows_follow_scale() {
        assert_eq!(size_to_level_columns_rows(SIZE, level(11)), (2, 1));
        assert_eq!(size_to_level_columns_rows(SIZE, level(10)), (1, 1));
        assert_eq!(size_to_level_columns_rows(SIZE, level(12)), (4, 2));
        assert_eq!(
            size_to_level_columns_rows(ImageSize::new(3000, 1500), level(12)),
            (3, 2)
        );
    }

    #[test]
    fn overlap_is_reflexive() {
        for z in 8..13 {
            for x in 0..4 {
                for y in 0..3 {
                    let tile = TileCoords3D::new(x, y, z);
                    assert!(has_overlap_2d(tile, tile));
                }
            }
        }
    }

    #[test]
    fn overlap_is_symmetric_across_levels() {
        let tiles: Vec<TileCoords3D> = (9..13)
            .flat_map(|z| {
                (0..4).flat_map(move |x| {
                    (0..4).map(move |y| TileCoords3D::new(x, y, z))
                })
            })
            .collect();
        for a in &tiles {
            for b in &tiles {
                assert_eq!(
                    has_overlap_2d(*a, *b),
                    has_overlap_2d(*b, *a),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn overlap_requires_containment_on_both_axes() {
        let coarse = TileCoords3D::new(1, 0, 10);
        assert!(has_overlap_2d(coarse, TileCoords3D::new(2, 0, 11)));
        assert!(has_overlap_2d(coarse, TileCoords3D::new(3, 1, 11)));
        assert!(!has_overlap_2d(coarse, TileCoords3D::new(1, 0, 11)));
        // x matches, y does not.
        assert!(!has_overlap_2d(coarse, TileCoords3D::new(2, 2, 11)));
        assert!(has_overlap_2d(coarse, TileCoords3D::new(7, 3, 12)));
        assert!(!has_overlap_2d(coarse, TileCoords3D::new(8, 3, 12)));
    }

    #[test]
    fn same_level_overlap_is_index_equality() {
        assert!(!has_overlap_2d(
            TileCoords3D::new(0, 0, 11),
            TileCoords3D::new(1, 0, 11)
        ));
    }

    #[test]
    fn far_apart_levels_do_not_overflow() {
        let root = TileCoords3D::new(0, 0, 0);
        let deep = TileCoords3D::new(5, 7, 60);
        assert!(has_overlap_2d(root, deep));
    }

    #[test]
    fn pixel_rects_are_full_inside_and_clipped_at_edges() {
        let size = ImageSize::new(3000, 1500);
        let level = PyramidLevel::new(12, base_image_level(size));
        let tile_pixel_size = level_tile_pixel_size(level) as u32;
        assert_eq!(tile_pixel_size, 1024);

        let interior = tile_to_pixel_coords_2d(TileCoords2D::new(1, 0), size, level);
        assert_eq!(interior, TilePixelRect::new(1024, 0, 1024, 1024));

        let edge = tile_to_pixel_coords_2d(TileCoords2D::new(2, 1), size, level);
        assert_eq!(edge, TilePixelRect::new(2048, 1024, 952, 476));
        assert!(edge.w <= tile_pixel_size && edge.h <= tile_pixel_size);

        let beyond = tile_to_pixel_coords_2d(TileCoords2D::new(5, 5), size, level);
        assert!(beyond.is_empty());
    }

    #[test]
    fn coarse_tiles_cover_whole_image() {
        let rect = tile_to_pixel_coords_2d(TileCoords2D::new(0, 0), SIZE, level(10));
        assert_eq!(rect, TilePixelRect::new(0, 0, 2048, 1024));
    }

    #[test]
    fn basic_points_map_into_their_tiles() {
        let size = ImageSize::new(3000, 1500);
        for z in 10..14 {
            let level = PyramidLevel::new(z, base_image_level(size));
            for i in 0..=20 {
                for j in 0..=20 {
                    let basic = [i as f64 / 20.0, j as f64 / 20.0];
                    let tile = basic_to_tile_coords_2d(basic, size, level);
                    let rect = tile_to_pixel_coords_2d(tile, size, level);
                    let px = ((basic[0] * size.w as f64) as u32).min(size.w - 1);
                    let py = ((basic[1] * size.h as f64) as u32).min(size.h - 1);
                    assert!(
                        rect.contains(px, py),
                        "level {z}: {basic:?} -> {tile:?} / {rect:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn basic_coords_clamp_out_of_range_points() {
        let level = level(11);
        assert_eq!(
            basic_to_tile_coords_2d([-0.5, -3.0], SIZE, level),
            TileCoords2D::new(0, 0)
        );
        assert_eq!(
            basic_to_tile_coords_2d([1.5, 2.0], SIZE, level),
            TileCoords2D::new(1, 0)
        );
        assert_eq!(
            basic_to_tile_coords_2d([f64::NAN, 0.5], SIZE, level),
            TileCoords2D::new(0, 0)
        );
    }

    #[test]
    fn corner_enumeration_contains_both_corners() {
        let level = level(12);
        let top_left = TileCoords2D::new(1, 0);
        let bottom_right = TileCoords2D::new(2, 1);
        let tiles = corners_to_tiles_coords_2d(top_left, bottom_right, SIZE, level);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&top_left));
        assert!(tiles.contains(&bottom_right));
    }

    #[test]
    fn corner_enumeration_wraps_on_x() {
        let level = level(12);
        let top_left = TileCoords2D::new(3, 0);
        let bottom_right = TileCoords2D::new(0, 1);
        let tiles = corners_to_tiles_coords_2d(top_left, bottom_right, SIZE, level);
        assert_eq!(
            tiles,
            vec![
                TileCoords2D::new(3, 0),
                TileCoords2D::new(3, 1),
                TileCoords2D::new(0, 0),
                TileCoords2D::new(0, 1),
            ]
        );

        let wide = corners_to_tiles_coords_2d(
            TileCoords2D::new(2, 0),
            TileCoords2D::new(1, 0),
            SIZE,
            level,
        );
        let xs: Vec<u32> = wide.iter().map(|tile| tile.x).collect();
        assert_eq!(xs, vec![2, 3, 0, 1]);
    }

    #[test]
    fn corner_enumeration_does_not_wrap_on_y() {
        let tiles = corners_to_tiles_coords_2d(
            TileCoords2D::new(0, 1),
            TileCoords2D::new(1, 0),
            SIZE,
            level(12),
        );
        assert!(tiles.is_empty());
    }

    #[test]
    fn bbox_across_seam_selects_both_sides() {
        let bbox = BasicBBox::new(0.9, 0.0, 0.1, 0.4);
        let tiles = bbox_to_tiles_coords_2d(&bbox, SIZE, level(12));
        assert_eq!(
            tiles,
            vec![TileCoords2D::new(3, 0), TileCoords2D::new(0, 0)]
        );
    }

    #[test]
    fn verify_size_rejects_zero_sides() {
        assert!(verify_size(SIZE));
        assert!(!verify_size(ImageSize::new(0, 1024)));
    }
}
