//! In-memory sources and a recording render backend for tests.
//!
//! Compiled for this crate's own tests and, behind the `test-support`
//! feature, for downstream integration tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use tilestream_contracts::{
    SourceError, SourceResult, TileByteSource, TileCatalogSource,
};
use tilestream_model::{
    ImageId, ImageSize, PyramidLevel, TileCoords3D, TileDescriptor,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::bitmap::TileBitmap;
use crate::error::{Result, TileError};
use crate::pyramid::{base_image_level, size_to_level_columns_rows};
use crate::render::{RenderBackend, TileQuad};

/// Encode a solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("in-memory png encoding cannot fail");
    out.into_inner()
}

pub fn solid_bitmap(width: u32, height: u32, rgba: [u8; 4]) -> TileBitmap {
    TileBitmap::new(RgbaImage::from_pixel(width, height, Rgba(rgba)))
}

/// URL the stub catalog hands out for a tile.
pub fn stub_url(image_id: &ImageId, tile: TileCoords3D) -> String {
    format!("mem://{}/{}/{}_{}", image_id, tile.z, tile.x, tile.y)
}

/// Catalog listing the full tile grid of one image at any level.
pub struct StubCatalog {
    size: ImageSize,
    calls: Mutex<Vec<(ImageId, u32)>>,
    failures: AtomicUsize,
    duplicates: AtomicUsize,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl StubCatalog {
    pub fn new(size: ImageSize) -> Self {
        Self {
            size,
            calls: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` calls with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Answer the next `count` calls with the first descriptor listed twice.
    pub fn duplicate_next(&self, count: usize) {
        self.duplicates.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(ImageId, u32)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, level: u32) -> usize {
        self.calls.lock().iter().filter(|(_, z)| *z == level).count()
    }

    pub fn levels_requested(&self) -> Vec<u32> {
        self.calls.lock().iter().map(|(_, z)| *z).collect()
    }
}

#[async_trait::async_trait]
impl TileCatalogSource for StubCatalog {
    async fn tile_catalog(
        &self,
        image_id: &ImageId,
        level: u32,
    ) -> SourceResult<Vec<TileDescriptor>> {
        self.calls.lock().push((image_id.clone(), level));

        if take_one(&self.failures) {
            return Err(SourceError::Transport("stub failure".into()));
        }

        let pyramid = PyramidLevel::new(level, base_image_level(self.size));
        let (columns, rows) = size_to_level_columns_rows(self.size, pyramid);
        let mut descriptors = Vec::new();
        for x in 0..columns {
            for y in 0..rows {
                let tile = TileCoords3D::new(x, y, level);
                descriptors
                    .push(TileDescriptor::new(stub_url(image_id, tile), tile));
            }
        }
        if take_one(&self.duplicates)
            && let Some(first) = descriptors.first().cloned()
        {
            descriptors.push(first);
        }
        Ok(descriptors)
    }
}

/// Byte source serving registered payloads, or a small PNG for unknown URLs.
#[derive(Default)]
pub struct MemoryByteSource {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.payloads.lock().insert(url.into(), bytes);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.as_str() == url).count()
    }
}

#[async_trait::async_trait]
impl TileByteSource for MemoryByteSource {
    async fn tile_bytes(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> SourceResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        self.requests.lock().push(url.to_string());
        Ok(self
            .payloads
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| png_bytes(4, 4, [200, 100, 50, 255])))
    }
}

/// Byte source that never delivers; every request parks until cancelled.
#[derive(Default)]
pub struct PendingByteSource {
    requests: Mutex<Vec<(String, CancellationToken)>>,
    arrived: Notify,
}

impl PendingByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> Vec<CancellationToken> {
        self.requests
            .lock()
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Wait until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.arrived.notified();
            if self.requests.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait::async_trait]
impl TileByteSource for PendingByteSource {
    async fn tile_bytes(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> SourceResult<Vec<u8>> {
        self.requests.lock().push((url.to_string(), cancel.clone()));
        self.arrived.notify_waiters();
        cancel.cancelled().await;
        Err(SourceError::Cancelled)
    }
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub quad: TileQuad,
    pub bitmap_size: (u32, u32),
}

/// Backend that records draw calls instead of rasterising them.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    max_texture_size: u32,
    draws: Arc<Mutex<Vec<RecordedDraw>>>,
    created: Arc<Mutex<Vec<(u32, u32)>>>,
    released: Arc<AtomicUsize>,
}

/// Target of the recording backend; the handle is the same shared log.
#[derive(Debug, Clone)]
pub struct RecordingTarget {
    pub width: u32,
    pub height: u32,
    draws: Arc<Mutex<Vec<RecordedDraw>>>,
}

impl RecordingTarget {
    pub fn draws(&self) -> Vec<RecordedDraw> {
        self.draws.lock().clone()
    }
}

impl RecordingBackend {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            ..Self::default()
        }
    }

    pub fn draws(&self) -> Vec<RecordedDraw> {
        self.draws.lock().clone()
    }

    pub fn draw_count(&self) -> usize {
        self.draws.lock().len()
    }

    pub fn created_targets(&self) -> Vec<(u32, u32)> {
        self.created.lock().clone()
    }

    pub fn released_targets(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl RenderBackend for RecordingBackend {
    type Target = RecordingTarget;
    type Handle = RecordingTarget;

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Self::Target> {
        if width == 0 || height == 0 {
            return Err(TileError::Render("empty target".into()));
        }
        self.created.lock().push((width, height));
        Ok(RecordingTarget {
            width,
            height,
            draws: Arc::clone(&self.draws),
        })
    }

    fn handle(&self, target: &Self::Target) -> Self::Handle {
        target.clone()
    }

    fn draw_tile(
        &mut self,
        target: &mut Self::Target,
        quad: &TileQuad,
        bitmap: &TileBitmap,
    ) -> Result<()> {
        target.draws.lock().push(RecordedDraw {
            quad: *quad,
            bitmap_size: (bitmap.width(), bitmap.height()),
        });
        Ok(())
    }

    fn release_target(&mut self, _target: Self::Target) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
