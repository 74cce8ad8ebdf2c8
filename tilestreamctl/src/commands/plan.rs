use anyhow::{Result, bail};
use serde::Serialize;
use tilestream_core::pyramid::{
    TILE_MIN_REQUEST_LEVEL, TILE_SIZE, base_image_level,
    bbox_to_tiles_coords_2d, region_image_level, size_to_level_columns_rows,
    verify_size,
};
use tilestream_model::{
    BasicBBox, ImageSize, PyramidLevel, RegionOfInterest, TileCoords3D,
};

#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub width: u32,
    pub height: u32,
    pub bbox: BasicBBox,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub min_level: Option<u32>,
}

/// Tiles a streamer would request for one region of interest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub size: ImageSize,
    pub tile_size: u32,
    pub level: u32,
    pub max_level: u32,
    pub columns: u32,
    pub rows: u32,
    pub tiles: Vec<TileCoords3D>,
}

pub fn build_plan(args: &PlanArgs) -> Result<Plan> {
    let size = ImageSize::new(args.width, args.height);
    if !verify_size(size) {
        bail!("image size {size} cannot be tiled");
    }
    let roi =
        RegionOfInterest::new(args.bbox, args.pixel_width, args.pixel_height);
    if !roi.has_valid_pixel_extent() {
        bail!("pixel width and height must be finite and positive");
    }

    let max_level = base_image_level(size);
    let z = region_image_level(
        &roi,
        args.min_level.unwrap_or(TILE_MIN_REQUEST_LEVEL),
        max_level,
    );
    let level = PyramidLevel::new(z, max_level);
    let (columns, rows) = size_to_level_columns_rows(size, level);
    let tiles = bbox_to_tiles_coords_2d(&roi.bbox, size, level)
        .into_iter()
        .map(|tile| tile.at_level(z))
        .collect();

    Ok(Plan {
        size,
        tile_size: TILE_SIZE,
        level: z,
        max_level,
        columns,
        rows,
        tiles,
    })
}

pub fn plan(args: PlanArgs) -> Result<()> {
    let plan = build_plan(&args)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(width: u32, height: u32, bbox: BasicBBox, px: f64) -> PlanArgs {
        PlanArgs {
            width,
            height,
            bbox,
            pixel_width: px,
            pixel_height: px,
            min_level: None,
        }
    }

    #[test]
    fn full_detail_view_lists_the_native_grid() {
        let plan =
            build_plan(&args(2048, 1024, BasicBBox::FULL, 1.0 / 2048.0))
                .expect("plan");
        assert_eq!(plan.level, 11);
        assert_eq!(plan.max_level, 11);
        assert_eq!((plan.columns, plan.rows), (2, 1));
        assert_eq!(
            plan.tiles,
            vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
        );
    }

    #[test]
    fn zoomed_out_view_is_held_at_the_minimum_level() {
        let plan = build_plan(&args(8192, 4096, BasicBBox::FULL, 1.0 / 256.0))
            .expect("plan");
        assert_eq!(plan.level, 10);
        assert_eq!(plan.max_level, 13);
        assert_eq!(plan.tiles.len(), 1);
    }

    #[test]
    fn seam_crossing_box_wraps_columns() {
        let plan = build_plan(&args(
            8192,
            4096,
            BasicBBox::new(0.9, 0.0, 0.1, 0.2),
            1.0 / 8192.0,
        ))
        .expect("plan");
        let xs: Vec<u32> = plan.tiles.iter().map(|tile| tile.x).collect();
        assert_eq!(xs, vec![7, 0]);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(build_plan(&args(0, 10, BasicBBox::FULL, 0.01)).is_err());
        assert!(build_plan(&args(10, 10, BasicBBox::FULL, 0.0)).is_err());
    }

    #[test]
    fn plan_serializes_tiles_with_levels() {
        let plan = build_plan(&args(1024, 1024, BasicBBox::FULL, 1.0 / 1024.0))
            .expect("plan");
        let json = serde_json::to_value(&plan).expect("json");
        assert_eq!(json["level"], 10);
        assert_eq!(json["tiles"][0]["z"], 10);
    }
}
