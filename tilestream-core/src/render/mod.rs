//! Render target backends.
//!
//! The streamer owns exactly one persistent target per image and paints
//! every tile into it through a [`RenderBackend`]. Targets are allocated
//! once, never resized and never cleared; later draws simply overwrite the
//! pixels underneath them.

#[cfg(feature = "wgpu")]
pub mod gpu;
pub mod quad;
pub mod raster;

#[cfg(feature = "wgpu")]
pub use gpu::{WgpuCompositor, WgpuTarget};
pub use quad::{Mat4, PixelBounds, TileQuad};
pub use raster::{RasterCompositor, RasterTarget, RasterTexture};

use tilestream_model::ImageSize;

use crate::bitmap::TileBitmap;
use crate::error::Result;

/// Owner of the drawing context a streamer paints through.
///
/// All calls happen while the streamer holds its state lock, so
/// implementations never see two draws at once.
pub trait RenderBackend: Send + 'static {
    /// The persistent texture tiles are composited into.
    type Target: Send + 'static;

    /// Cheap shareable reference to a target, handed to whoever samples it.
    type Handle: Clone + Send + Sync + 'static;

    /// Largest side a target may have.
    fn max_texture_size(&self) -> u32;

    fn create_target(&mut self, width: u32, height: u32)
    -> Result<Self::Target>;

    fn handle(&self, target: &Self::Target) -> Self::Handle;

    /// Draw `bitmap` stretched over `quad`, leaving the rest of the target
    /// untouched.
    fn draw_tile(
        &mut self,
        target: &mut Self::Target,
        quad: &TileQuad,
        bitmap: &TileBitmap,
    ) -> Result<()>;

    fn release_target(&mut self, target: Self::Target);
}

/// Size of the render target for an image: scaled down uniformly until the
/// longer side fits `max_texture_size`, never scaled up.
pub fn target_size(image: ImageSize, max_texture_size: u32) -> ImageSize {
    let longest = image.max_dimension().max(1) as f64;
    let scale = (max_texture_size.max(1) as f64 / longest).min(1.0);
    ImageSize::new(
        ((image.w as f64 * scale).floor() as u32).max(1),
        ((image.h as f64 * scale).floor() as u32).max(1),
    )
}
