//! Decoded tile pixels.

use std::sync::Arc;

use image::RgbaImage;

use crate::error::{Result, TileError};

/// A decoded RGBA bitmap, cheap to clone.
///
/// Tiles are shared between the cache and whichever paint is consuming them,
/// so the pixels live behind an `Arc` and are freed when the last holder
/// drops.
#[derive(Debug, Clone)]
pub struct TileBitmap(Arc<RgbaImage>);

impl TileBitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    /// Decode encoded bytes (PNG, JPEG or WebP) on the current thread.
    ///
    /// Takes the buffer by value so it is released when decoding returns,
    /// whichever way it goes.
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| TileError::Decode(e.to_string()))?;
        drop(bytes);
        Ok(Self::new(decoded.into_rgba8()))
    }

    /// Decode on tokio's blocking pool.
    pub async fn decode_blocking(bytes: Vec<u8>) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::decode(bytes))
            .await
            .map_err(|e| TileError::Decode(e.to_string()))?
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    /// Tightly packed RGBA8 rows.
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }
}

impl From<RgbaImage> for TileBitmap {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}
