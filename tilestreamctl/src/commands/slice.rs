use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use image::{RgbaImage, imageops};
use tilestream_core::pyramid::{
    TILE_MIN_REQUEST_LEVEL, TILE_SIZE, base_image_level, level_scale,
    size_to_level_columns_rows, verify_size,
};
use tilestream_core::sources::FsTileSource;
use tilestream_model::{ImageId, ImageSize, PyramidLevel, TileCoords3D};
use tracing::{debug, info};

use crate::manifest::PyramidManifest;

#[derive(Debug, Clone)]
pub struct SliceArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub image_id: String,
    pub min_level: Option<u32>,
}

pub async fn slice(args: SliceArgs) -> Result<()> {
    let started = Instant::now();
    let manifest = tokio::task::spawn_blocking(move || slice_blocking(&args))
        .await
        .context("slice task panicked")??;

    info!(
        image_id = %manifest.image_id,
        size = %manifest.size,
        min_level = manifest.min_level,
        max_level = manifest.max_level,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pyramid written"
    );
    Ok(())
}

/// Levels written for an image: `min_level` up to the native level, or just
/// `min_level` when the image is smaller than that.
pub fn pyramid_levels(size: ImageSize, min_level: u32) -> (u32, u32) {
    let native = base_image_level(size);
    (min_level, native.max(min_level))
}

fn slice_blocking(args: &SliceArgs) -> Result<PyramidManifest> {
    let image = image::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?
        .into_rgba8();
    let size = ImageSize::new(image.width(), image.height());
    if !verify_size(size) {
        bail!("image size {size} cannot be tiled");
    }

    let image_id = ImageId::new(args.image_id.as_str());
    let source = FsTileSource::new(&args.output);
    let native = base_image_level(size);
    let (min_level, max_level) = pyramid_levels(
        size,
        args.min_level.unwrap_or(TILE_MIN_REQUEST_LEVEL),
    );

    for z in min_level..=max_level {
        let level = PyramidLevel::new(z, native);
        let written = write_level(&source, &image_id, &image, size, level)?;
        debug!(image_id = %image_id, level = z, tiles = written, "level written");
    }

    let background = background_image(&image);
    let background_path = source.background_path(&image_id);
    background.save(&background_path).with_context(|| {
        format!("failed to write {}", background_path.display())
    })?;

    let manifest = PyramidManifest {
        image_id,
        size,
        min_level,
        max_level,
    };
    manifest.write(&args.output)?;
    Ok(manifest)
}

fn write_level(
    source: &FsTileSource,
    image_id: &ImageId,
    image: &RgbaImage,
    size: ImageSize,
    level: PyramidLevel,
) -> Result<usize> {
    let scale = level_scale(level);
    let scaled: Cow<'_, RgbaImage> = if scale == 1.0 {
        Cow::Borrowed(image)
    } else {
        let w = ((size.w as f64 * scale).ceil() as u32).max(1);
        let h = ((size.h as f64 * scale).ceil() as u32).max(1);
        Cow::Owned(imageops::resize(
            image,
            w,
            h,
            imageops::FilterType::Triangle,
        ))
    };

    let dir = source.level_dir(image_id, level.z);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let (columns, rows) = size_to_level_columns_rows(size, level);
    for x in 0..columns {
        for y in 0..rows {
            let x0 = x * TILE_SIZE;
            let y0 = y * TILE_SIZE;
            let w = TILE_SIZE.min(scaled.width().saturating_sub(x0));
            let h = TILE_SIZE.min(scaled.height().saturating_sub(y0));
            if w == 0 || h == 0 {
                continue;
            }

            let tile = imageops::crop_imm(scaled.as_ref(), x0, y0, w, h)
                .to_image();
            let path = source.tile_path(image_id, TileCoords3D::new(x, y, level.z));
            tile.save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok((columns * rows) as usize)
}

/// Whole image shrunk so its longer side fits in one tile.
fn background_image(image: &RgbaImage) -> RgbaImage {
    let longest = image.width().max(image.height());
    if longest <= TILE_SIZE {
        return image.clone();
    }
    let w = ((image.width() as u64 * TILE_SIZE as u64) / longest as u64).max(1);
    let h = ((image.height() as u64 * TILE_SIZE as u64) / longest as u64).max(1);
    imageops::resize(image, w as u32, h as u32, imageops::FilterType::Triangle)
}
