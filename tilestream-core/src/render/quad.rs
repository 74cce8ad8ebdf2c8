//! Placement of one tile inside the full-image frame.
//!
//! Tiles are drawn as a single rectangle in a coordinate frame whose origin
//! is the centre of the full image, x to the right and y up, measured in
//! native image pixels. An orthographic projection spanning the whole image
//! maps that frame onto the render target regardless of the target's own
//! resolution.

use tilestream_model::{ImageSize, TilePixelRect};

/// Column-major 4x4 matrix, the layout WGSL uniforms expect.
pub type Mat4 = [[f32; 4]; 4];

/// Target-pixel bounds `[x0, x1) x [y0, y1)`, y down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBounds {
    pub const fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub const fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// One ephemeral tile draw: the tile's native footprint within the frame of
/// the full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileQuad {
    pub frame: ImageSize,
    pub rect: TilePixelRect,
}

impl TileQuad {
    pub const fn new(frame: ImageSize, rect: TilePixelRect) -> Self {
        Self { frame, rect }
    }

    /// Quad covering the whole frame; used for the background.
    pub const fn full_frame(frame: ImageSize) -> Self {
        Self {
            frame,
            rect: TilePixelRect::new(0, 0, frame.w, frame.h),
        }
    }

    /// Rectangle centre in the image-centred frame.
    pub fn center(&self) -> [f64; 2] {
        let rect = self.rect;
        [
            rect.x as f64 + rect.w as f64 / 2.0 - self.frame.w as f64 / 2.0,
            self.frame.h as f64 / 2.0 - (rect.y as f64 + rect.h as f64 / 2.0),
        ]
    }

    pub fn half_extent(&self) -> [f64; 2] {
        [self.rect.w as f64 / 2.0, self.rect.h as f64 / 2.0]
    }

    /// Orthographic projection of the image-centred frame onto clip space.
    pub fn projection(&self) -> Mat4 {
        let sx = 2.0 / self.frame.w.max(1) as f32;
        let sy = 2.0 / self.frame.h.max(1) as f32;
        [
            [sx, 0.0, 0.0, 0.0],
            [0.0, sy, 0.0, 0.0],
            [0.0, 0.0, -1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Unit square `[-1, 1]^2` to clip space: model transform of the quad
    /// followed by [`projection`](Self::projection).
    pub fn clip_transform(&self) -> Mat4 {
        let [cx, cy] = self.center();
        let [hw, hh] = self.half_extent();
        let projection = self.projection();
        let sx = projection[0][0];
        let sy = projection[1][1];
        [
            [hw as f32 * sx, 0.0, 0.0, 0.0],
            [0.0, hh as f32 * sy, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [cx as f32 * sx, cy as f32 * sy, 0.0, 1.0],
        ]
    }

    /// Normalized device bounds `[left, bottom, right, top]`.
    pub fn ndc_bounds(&self) -> [f64; 4] {
        let [cx, cy] = self.center();
        let [hw, hh] = self.half_extent();
        let sx = 2.0 / self.frame.w.max(1) as f64;
        let sy = 2.0 / self.frame.h.max(1) as f64;
        [
            (cx - hw) * sx,
            (cy - hh) * sy,
            (cx + hw) * sx,
            (cy + hh) * sy,
        ]
    }

    /// Viewport transform of [`ndc_bounds`](Self::ndc_bounds) onto a
    /// `width x height` target, clamped to the target.
    pub fn target_bounds(&self, width: u32, height: u32) -> PixelBounds {
        let [left, bottom, right, top] = self.ndc_bounds();
        let to_x = |ndc: f64| {
            ((ndc + 1.0) / 2.0 * width as f64)
                .round()
                .clamp(0.0, width as f64) as u32
        };
        let to_y = |ndc: f64| {
            ((1.0 - ndc) / 2.0 * height as f64)
                .round()
                .clamp(0.0, height as f64) as u32
        };
        PixelBounds {
            x0: to_x(left),
            y0: to_y(top),
            x1: to_x(right),
            y1: to_y(bottom),
        }
    }
}
