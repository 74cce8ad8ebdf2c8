//! Texture streaming for one image.
//!
//! A [`TextureStreamer`] turns a stream of viewport changes into tile
//! requests and composites arriving tiles into one persistent render target:
//!
//! 1. the region of interest picks a pyramid level from its on-screen pixel
//!    density,
//! 2. the region's corners pick the tile set at that level,
//! 3. cached tiles are painted at once, the rest are fetched (after the
//!    level's catalog, requested once per level),
//! 4. every painted tile evicts overlapping tiles of other levels from the
//!    rendered set so zooming back re-requests them.
//!
//! Fetches run as tasks on the runtime handed to [`TextureStreamer::new`].
//! All state lives behind one mutex; paints happen while holding it and never
//! interleave. Changing level or disposing cancels all outstanding requests,
//! and a cancelled request never paints.

mod request;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use tilestream_model::{
    ImageId, ImageSize, PyramidLevel, RegionOfInterest, TileCoords3D,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace, warn};

use crate::bitmap::TileBitmap;
use crate::cache::TileCache;
use crate::config::StreamerConfig;
use crate::fetch::TileFetcher;
use crate::pyramid::{
    basic_to_tile_coords_2d, corners_to_tiles_coords_2d, region_image_level,
    verify_size,
};
use crate::render::RenderBackend;

use request::{TileTask, UrlSource};
use state::StreamerState;

/// Everything a streamer needs to know about its image.
#[derive(Debug)]
pub struct StreamerSource<B> {
    pub image_id: ImageId,
    /// Native size; a zero side disables tiling.
    pub size: ImageSize,
    /// Low resolution preview painted over the whole target first.
    pub background: TileBitmap,
    pub backend: B,
}

/// Emitted after each tile paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUpdate {
    pub tile: TileCoords3D,
}

/// Streams the tiles of one image into one render target.
pub struct TextureStreamer<B: RenderBackend> {
    state: Arc<Mutex<StreamerState<B>>>,
    fetcher: Arc<TileFetcher>,
    runtime: Handle,
}

impl<B: RenderBackend> TextureStreamer<B> {
    /// Create a streamer; nothing is allocated until the first region of
    /// interest arrives.
    ///
    /// An invalid image size is logged and leaves the streamer in
    /// background-only mode.
    pub fn new(
        source: StreamerSource<B>,
        fetcher: Arc<TileFetcher>,
        config: &StreamerConfig,
        runtime: Handle,
    ) -> Self {
        if !verify_size(source.size) {
            warn!(
                image_id = %source.image_id,
                size = %source.size,
                "invalid image size, tiling disabled"
            );
        }

        Self {
            state: Arc::new(Mutex::new(StreamerState::new(source, config))),
            fetcher,
            runtime,
        }
    }

    /// Bring the render target up to date for a new viewport.
    ///
    /// No-op once disposed or when the region has no usable pixel extent.
    pub fn set_region_of_interest(&self, roi: &RegionOfInterest) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        if !roi.has_valid_pixel_extent() {
            trace!(image_id = %state.image_id, "ignoring region without pixel extent");
            return;
        }

        if !state.tiling_enabled() {
            state.ensure_target();
            return;
        }

        let z =
            region_image_level(roi, state.min_request_level, state.max_level);
        if state.level.map(|level| level.z) != Some(z) {
            state.change_level(z);
        }

        if !state.ensure_target() {
            return;
        }

        let level = state.pyramid_level(z);
        let size = state.size;
        let top_left = basic_to_tile_coords_2d(roi.bbox.top_left(), size, level);
        let bottom_right =
            basic_to_tile_coords_2d(roi.bbox.bottom_right(), size, level);
        for tile in corners_to_tiles_coords_2d(top_left, bottom_right, size, level)
        {
            self.request_tile(&mut state, tile.at_level(z));
        }
    }

    fn request_tile(&self, state: &mut StreamerState<B>, tile: TileCoords3D) {
        let id = TileCache::invent_id(tile);
        if state.rendered_level.contains(&id) || state.in_flight.contains_key(&id)
        {
            return;
        }

        if let Some(bitmap) = state.cache.get(id).cloned() {
            debug!(image_id = %state.image_id, tile = %tile, "painting cached tile");
            if state.paint(tile, &bitmap) {
                state.mark_rendered(tile);
            }
            return;
        }

        let known = state.cache.get_url(id).map(str::to_owned);
        let url = match known {
            Some(url) => UrlSource::Known(url),
            None if state.cache.has_url_level(tile.z) => {
                debug!(
                    image_id = %state.image_id,
                    tile = %tile,
                    "tile missing from level catalog"
                );
                return;
            }
            None => UrlSource::Catalog(state.catalog_future(&self.fetcher, tile.z)),
        };

        let (token, ticket) = state.begin_request(id);
        let task = TileTask {
            state: Arc::clone(&self.state),
            fetcher: Arc::clone(&self.fetcher),
            tile,
            id,
            ticket,
            token,
            url,
        };
        self.runtime.spawn(task.run());
    }

    /// Cancel every outstanding tile and catalog request.
    pub fn abort(&self) {
        self.state.lock().abort();
    }

    /// Cancel all work, release the target, clear the cache and complete
    /// every signal. Runs at most once; also invoked on drop.
    pub fn dispose(&self) {
        self.state.lock().dispose();
    }

    /// Latest render target handle; `None` until the first paint and after
    /// disposal.
    pub fn subscribe_created(&self) -> watch::Receiver<Option<B::Handle>> {
        self.state.lock().created.subscribe()
    }

    pub fn subscribe_has_texture(&self) -> watch::Receiver<bool> {
        self.state.lock().has_texture.subscribe()
    }

    /// One event per painted tile; the background paint is not reported.
    pub fn subscribe_updated(&self) -> broadcast::Receiver<TextureUpdate> {
        self.state.lock().updated.subscribe()
    }

    /// Number of tile requests currently outstanding.
    pub fn subscribe_in_flight(&self) -> watch::Receiver<usize> {
        self.state.lock().in_flight_count.subscribe()
    }

    pub fn texture(&self) -> Option<B::Handle> {
        self.state.lock().handle()
    }

    pub fn has_texture(&self) -> bool {
        *self.state.lock().has_texture.get()
    }

    pub fn level(&self) -> Option<PyramidLevel> {
        self.state.lock().level
    }

    /// Rendered set, ordered by level then index.
    pub fn rendered_tiles(&self) -> Vec<TileCoords3D> {
        let mut tiles: Vec<_> =
            self.state.lock().rendered.values().copied().collect();
        tiles.sort_by_key(|tile| (tile.z, tile.x, tile.y));
        tiles
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn cached_tiles(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn image_id(&self) -> ImageId {
        self.state.lock().image_id.clone()
    }

    pub fn size(&self) -> ImageSize {
        self.state.lock().size
    }
}

impl<B: RenderBackend> Drop for TextureStreamer<B> {
    fn drop(&mut self) {
        self.state.lock().dispose();
    }
}

impl<B: RenderBackend> std::fmt::Debug for TextureStreamer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TextureStreamer")
            .field("image_id", &state.image_id)
            .field("size", &state.size)
            .field("level", &state.level)
            .field("rendered", &state.rendered.len())
            .field("in_flight", &state.in_flight.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}
