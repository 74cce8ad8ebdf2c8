//! CPU render target built on the `image` crate.

use std::sync::Arc;

use image::{RgbaImage, imageops};
use parking_lot::RwLock;

use super::{RenderBackend, TileQuad};
use crate::bitmap::TileBitmap;
use crate::config::ResizeFilter;
use crate::error::{Result, TileError};

/// Largest target side the raster backend accepts by default.
pub const DEFAULT_RASTER_MAX_TEXTURE_SIZE: u32 = 8192;

/// Composites tiles into an in-memory RGBA buffer.
#[derive(Debug, Clone)]
pub struct RasterCompositor {
    max_texture_size: u32,
    filter: ResizeFilter,
}

/// Persistent raster target.
#[derive(Debug)]
pub struct RasterTarget {
    pixels: Arc<RwLock<RgbaImage>>,
}

/// Read side of a [`RasterTarget`].
#[derive(Debug, Clone)]
pub struct RasterTexture {
    pixels: Arc<RwLock<RgbaImage>>,
}

impl RasterTexture {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.read().dimensions()
    }

    /// Copy of the current pixels.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.read().clone()
    }
}

impl Default for RasterCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_RASTER_MAX_TEXTURE_SIZE)
    }
}

impl RasterCompositor {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            filter: ResizeFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl RenderBackend for RasterCompositor {
    type Target = RasterTarget;
    type Handle = RasterTexture;

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Self::Target> {
        if width == 0 || height == 0 {
            return Err(TileError::Render(format!(
                "cannot allocate a {width}x{height} target"
            )));
        }
        if width.max(height) > self.max_texture_size {
            return Err(TileError::Render(format!(
                "{width}x{height} exceeds max texture size {}",
                self.max_texture_size
            )));
        }
        Ok(RasterTarget {
            pixels: Arc::new(RwLock::new(RgbaImage::new(width, height))),
        })
    }

    fn handle(&self, target: &Self::Target) -> Self::Handle {
        RasterTexture {
            pixels: Arc::clone(&target.pixels),
        }
    }

    fn draw_tile(
        &mut self,
        target: &mut Self::Target,
        quad: &TileQuad,
        bitmap: &TileBitmap,
    ) -> Result<()> {
        let mut pixels = target.pixels.write();
        let (width, height) = pixels.dimensions();
        let bounds = quad.target_bounds(width, height);
        if bounds.is_empty() || bitmap.width() == 0 || bitmap.height() == 0 {
            return Ok(());
        }

        let x = i64::from(bounds.x0);
        let y = i64::from(bounds.y0);
        if (bitmap.width(), bitmap.height()) == (bounds.width(), bounds.height())
        {
            imageops::replace(&mut *pixels, bitmap.image(), x, y);
        } else {
            let resized = imageops::resize(
                bitmap.image(),
                bounds.width(),
                bounds.height(),
                self.filter.into(),
            );
            imageops::replace(&mut *pixels, &resized, x, y);
        }
        Ok(())
    }

    fn release_target(&mut self, target: Self::Target) {
        drop(target);
    }
}
